use anyhow::{Context, Result};
use proposal_builder::backend::HttpBackend;
use proposal_builder::config_store::ConfigStore;
use proposal_builder::controller::{ControllerSettings, ProposalController};
use proposal_builder::logging;
use proposal_builder::path_utils::{get_base_dir, resolve_config_path};
use proposal_builder::server::{AppServer, AppState};
use std::env;
use std::sync::Arc;
use tracing::{info, warn};

struct Args {
    config: Option<String>,
    port: Option<u16>,
}

fn main() -> Result<()> {
    logging::init();

    let args = parse_args();
    let base_dir = get_base_dir();
    let config_path = resolve_config_path(args.config, &base_dir);

    let config = ConfigStore::new(config_path.clone())
        .with_context(|| format!("設定ファイルエラー: {}", config_path.display()))?;
    info!(path = %config_path.display(), "config loaded");

    let backend_url = config.backend_url();
    let backend = HttpBackend::new(&backend_url, config.request_timeout())
        .context("HTTPクライアントの初期化に失敗しました")?;
    let controller = ProposalController::new(
        backend,
        ControllerSettings {
            image_count: config.image_count(),
            mobile_breakpoint_px: config.mobile_breakpoint_px(),
            letterhead: config.letterhead(),
        },
    );

    let state = Arc::new(AppState::new(controller));
    let preferred_port = args.port.unwrap_or_else(|| config.server_port());
    let mut server =
        AppServer::start(state, preferred_port).context("UIサーバーの起動に失敗しました")?;

    info!(
        url = %format!("http://127.0.0.1:{}/", server.port()),
        backend = %backend_url,
        "proposal builder ready"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;
    runtime
        .block_on(tokio::signal::ctrl_c())
        .context("failed to listen for Ctrl-C")?;

    info!("shutting down");
    server.stop();
    Ok(())
}

fn parse_args() -> Args {
    let mut config = None;
    let mut port = None;
    let mut args = env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = args.next(),
            "--port" => match args.next().map(|value| value.parse::<u16>()) {
                Some(Ok(value)) if value > 0 => port = Some(value),
                Some(_) => warn!("ignoring invalid --port value"),
                None => {}
            },
            other => warn!(argument = other, "ignoring unknown argument"),
        }
    }

    Args { config, port }
}
