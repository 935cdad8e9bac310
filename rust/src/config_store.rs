use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use toml::map::Map;
use toml::Value;

use crate::renderer::Letterhead;

pub const DEFAULT_SERVER_PORT: u16 = 3100;
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_IMAGE_COUNT: usize = 8;
pub const DEFAULT_MOBILE_BREAKPOINT_PX: u32 = 1000;
const MAX_IMAGE_COUNT: i64 = 50;
const MAX_TIMEOUT_SEC: f64 = 86_400.0;

const DEFAULT_COMPANY: [(&str, &str); 4] = [
    ("name", "株式会社よつや"),
    ("tel", "045-593-5547"),
    ("fax", "045-590-1171"),
    ("mail", "yotsuya.center@gmail.com"),
];

#[derive(Debug)]
pub struct ConfigStore {
    pub path: PathBuf,
    doc: Value,
}

impl ConfigStore {
    /// Loads `path`, writing a default file first when it does not exist.
    /// Invalid values are replaced by defaults and the result saved back.
    pub fn new(path: PathBuf) -> Result<Self> {
        let doc = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("failed to parse TOML: {}", path.display()))?
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create config directory: {}", parent.display())
                })?;
            }
            Value::Table(Map::new())
        };

        let mut store = Self { path, doc };
        store.normalize_doc();
        store.save()?;
        Ok(store)
    }

    pub fn save(&self) -> Result<()> {
        let serialized = toml::to_string_pretty(&self.doc).context("failed to serialize TOML")?;
        let text = move_app_table_to_top(&serialized);
        fs::write(&self.path, text)
            .with_context(|| format!("failed to write config: {}", self.path.display()))
    }

    pub fn server_port(&self) -> u16 {
        self.app_table()
            .and_then(|t| t.get("server_port"))
            .and_then(value_to_i64)
            .and_then(|v| u16::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    pub fn backend_url(&self) -> String {
        self.app_table()
            .and_then(|t| t.get("backend_url"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_BACKEND_URL)
            .to_string()
    }

    pub fn image_count(&self) -> usize {
        self.app_table()
            .and_then(|t| t.get("image_count"))
            .and_then(value_to_i64)
            .filter(|v| (1..=MAX_IMAGE_COUNT).contains(v))
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(DEFAULT_IMAGE_COUNT)
    }

    pub fn mobile_breakpoint_px(&self) -> u32 {
        self.app_table()
            .and_then(|t| t.get("mobile_breakpoint_px"))
            .and_then(value_to_i64)
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MOBILE_BREAKPOINT_PX)
    }

    /// `None` when requests should wait indefinitely.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.app_table()
            .and_then(|t| t.get("request_timeout_sec"))
            .and_then(value_to_f64)
            .filter(|v| *v > 0.0 && *v <= MAX_TIMEOUT_SEC)
            .and_then(|v| Duration::try_from_secs_f64(v).ok())
    }

    pub fn letterhead(&self) -> Letterhead {
        let company = self
            .doc
            .as_table()
            .and_then(|root| root.get("company"))
            .and_then(Value::as_table);
        let field = |key: &str| {
            company
                .and_then(|t| t.get(key))
                .map(value_to_text)
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        Letterhead {
            name: field("name"),
            tel: field("tel"),
            fax: field("fax"),
            mail: field("mail"),
        }
    }

    fn normalize_doc(&mut self) {
        if !self.doc.is_table() {
            self.doc = Value::Table(Map::new());
        }

        {
            let app = self.ensure_table_mut("app");

            let port = app
                .get("server_port")
                .and_then(value_to_i64)
                .filter(|v| (1..=65_535).contains(v))
                .unwrap_or(i64::from(DEFAULT_SERVER_PORT));
            app.insert("server_port".to_string(), Value::Integer(port));

            let backend_url = app
                .get("backend_url")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_BACKEND_URL)
                .to_string();
            app.insert("backend_url".to_string(), Value::String(backend_url));

            let image_count = app
                .get("image_count")
                .and_then(value_to_i64)
                .filter(|v| (1..=MAX_IMAGE_COUNT).contains(v))
                .unwrap_or(DEFAULT_IMAGE_COUNT as i64);
            app.insert("image_count".to_string(), Value::Integer(image_count));

            let breakpoint = app
                .get("mobile_breakpoint_px")
                .and_then(value_to_i64)
                .filter(|v| (1..=i64::from(u32::MAX)).contains(v))
                .unwrap_or(i64::from(DEFAULT_MOBILE_BREAKPOINT_PX));
            app.insert(
                "mobile_breakpoint_px".to_string(),
                Value::Integer(breakpoint),
            );

            let timeout = app
                .get("request_timeout_sec")
                .and_then(value_to_f64)
                .filter(|v| (0.0..=MAX_TIMEOUT_SEC).contains(v))
                .unwrap_or(0.0);
            app.insert("request_timeout_sec".to_string(), Value::Float(timeout));
        }

        {
            let company = self.ensure_table_mut("company");
            for (key, default) in DEFAULT_COMPANY {
                let value = company
                    .get(key)
                    .map(value_to_text)
                    .unwrap_or_else(|| default.to_string());
                company.insert(key.to_string(), Value::String(value));
            }
        }
    }

    fn app_table(&self) -> Option<&Map<String, Value>> {
        self.doc
            .as_table()
            .and_then(|root| root.get("app"))
            .and_then(Value::as_table)
    }

    fn root_table_mut(&mut self) -> &mut Map<String, Value> {
        if !self.doc.is_table() {
            self.doc = Value::Table(Map::new());
        }
        match &mut self.doc {
            Value::Table(root) => root,
            _ => unreachable!("root replaced with a table above"),
        }
    }

    fn ensure_table_mut(&mut self, name: &str) -> &mut Map<String, Value> {
        let root = self.root_table_mut();
        let entry = root
            .entry(name.to_string())
            .or_insert_with(|| Value::Table(Map::new()));
        if !entry.is_table() {
            *entry = Value::Table(Map::new());
        }
        match entry {
            Value::Table(table) => table,
            _ => unreachable!("entry replaced with a table above"),
        }
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(v) => v.clone(),
        Value::Integer(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Boolean(v) => v.to_string(),
        Value::Datetime(v) => v.to_string(),
        Value::Array(_) | Value::Table(_) => String::new(),
    }
}

fn value_to_f64(value: &Value) -> Option<f64> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|v| v as f64))
        .or_else(|| value.as_str().and_then(|v| v.trim().parse::<f64>().ok()))
}

fn value_to_i64(value: &Value) -> Option<i64> {
    value
        .as_integer()
        .or_else(|| value.as_float().map(|v| v as i64))
        .or_else(|| value.as_str().and_then(|v| v.trim().parse::<i64>().ok()))
}

/// `toml` writes plain keys before tables, which can leave `[app]` below
/// other headers once extra tables appear. Moves the `[app]` block first.
fn move_app_table_to_top(serialized: &str) -> String {
    let ends_with_newline = serialized.ends_with('\n');
    let lines: Vec<&str> = serialized.split('\n').collect();
    let header_starts: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter_map(|(index, line)| is_top_level_header_line(line).then_some(index))
        .collect();

    let Some(&first_header) = header_starts.first() else {
        return serialized.to_string();
    };

    let app_block = header_starts.iter().enumerate().find_map(|(i, start)| {
        (lines[*start].trim() == "[app]").then(|| {
            let end = header_starts.get(i + 1).copied().unwrap_or(lines.len());
            (*start, end)
        })
    });

    let Some((app_start, app_end)) = app_block else {
        return serialized.to_string();
    };

    if app_start == first_header {
        return serialized.to_string();
    }

    let mut rebuilt: Vec<&str> = Vec::with_capacity(lines.len());
    rebuilt.extend_from_slice(&lines[..first_header]);
    rebuilt.extend_from_slice(&lines[app_start..app_end]);
    for (i, start) in header_starts.iter().enumerate() {
        if *start == app_start {
            continue;
        }
        let end = header_starts.get(i + 1).copied().unwrap_or(lines.len());
        rebuilt.extend_from_slice(&lines[*start..end]);
    }

    let mut output = rebuilt.join("\n");
    if ends_with_newline && !output.ends_with('\n') {
        output.push('\n');
    }
    output
}

fn is_top_level_header_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || !trimmed.starts_with('[') || !trimmed.ends_with(']') {
        return false;
    }
    !trimmed.contains(" = ")
}

#[cfg(test)]
mod tests {
    use super::{
        move_app_table_to_top, ConfigStore, DEFAULT_BACKEND_URL, DEFAULT_IMAGE_COUNT,
        DEFAULT_MOBILE_BREAKPOINT_PX, DEFAULT_SERVER_PORT,
    };
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;

    fn fixture_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "proposal_config_store_test_{}_{}.toml",
            name,
            std::process::id()
        ));
        path
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let path = fixture_path("missing");
        fs::remove_file(&path).ok();

        let store = ConfigStore::new(path.clone()).expect("load store");
        assert_eq!(store.server_port(), DEFAULT_SERVER_PORT);
        assert_eq!(store.backend_url(), DEFAULT_BACKEND_URL);
        assert_eq!(store.image_count(), DEFAULT_IMAGE_COUNT);
        assert_eq!(store.mobile_breakpoint_px(), DEFAULT_MOBILE_BREAKPOINT_PX);
        assert_eq!(store.request_timeout(), None);
        assert_eq!(store.letterhead().name, "株式会社よつや");

        let saved = fs::read_to_string(&path).expect("read saved");
        assert!(saved.contains("[app]"));
        assert!(saved.contains("[company]"));

        fs::remove_file(path).ok();
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let path = fixture_path("invalid");
        fs::write(
            &path,
            r#"
[app]
server_port = 70000
backend_url = "  "
image_count = 0
mobile_breakpoint_px = -5
request_timeout_sec = "30"

[company]
name = "テスト商事"
tel = 123
"#,
        )
        .expect("fixture write");

        let store = ConfigStore::new(path.clone()).expect("load store");
        assert_eq!(store.server_port(), DEFAULT_SERVER_PORT);
        assert_eq!(store.backend_url(), DEFAULT_BACKEND_URL);
        assert_eq!(store.image_count(), DEFAULT_IMAGE_COUNT);
        assert_eq!(store.mobile_breakpoint_px(), DEFAULT_MOBILE_BREAKPOINT_PX);
        assert_eq!(store.request_timeout(), Some(Duration::from_secs(30)));

        let letterhead = store.letterhead();
        assert_eq!(letterhead.name, "テスト商事");
        assert_eq!(letterhead.tel, "123");
        assert_eq!(letterhead.mail, "yotsuya.center@gmail.com");

        fs::remove_file(path).ok();
    }

    #[test]
    fn out_of_range_timeout_is_disabled() {
        let path = fixture_path("timeout");
        fs::write(&path, "[app]\nrequest_timeout_sec = 1e30\n").expect("fixture write");

        let store = ConfigStore::new(path.clone()).expect("load store");
        assert_eq!(store.request_timeout(), None);

        let saved = fs::read_to_string(&path).expect("read saved");
        assert!(saved.contains("request_timeout_sec = 0.0"));

        fs::remove_file(path).ok();
    }

    #[test]
    fn keeps_app_table_before_other_tables() {
        let path = fixture_path("order");
        fs::write(
            &path,
            r#"
[company]
name = "テスト商事"

[app]
image_count = 4
"#,
        )
        .expect("fixture write");

        let store = ConfigStore::new(path.clone()).expect("load store");
        assert_eq!(store.image_count(), 4);

        let saved = fs::read_to_string(&path).expect("read saved");
        let app_pos = saved.find("[app]").expect("app exists");
        let company_pos = saved.find("[company]").expect("company exists");
        assert!(app_pos < company_pos, "[app] should be written first");

        fs::remove_file(path).ok();
    }

    #[test]
    fn moves_app_block_to_top() {
        let input = "[company]\nname = \"x\"\n\n[app]\nimage_count = 4\n";
        let output = move_app_table_to_top(input);
        assert!(output.starts_with("[app]\nimage_count = 4\n"));
        assert!(output.contains("[company]\nname = \"x\""));
        assert!(output.ends_with('\n'));
    }
}
