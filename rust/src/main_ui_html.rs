use html_escape::encode_text;
use serde_json::Value;

use crate::messages;
use crate::renderer::PROPOSAL_STYLE;

pub fn build_main_ui_html() -> String {
    MAIN_UI_HTML
        .replace("__PROPOSAL_STYLE__", PROPOSAL_STYLE)
        .replace("__LOADING_SEARCH__", &js_string(messages::LOADING_SEARCH))
        .replace("__LOADING_GENERATE__", &js_string(messages::LOADING_GENERATE))
        .replace("__SEARCH_FAILED__", &js_string(messages::SEARCH_FAILED))
        .replace("__GENERATE_FAILED__", &js_string(messages::GENERATE_FAILED))
        .replace("__SELECT_FAILED__", &js_string(messages::INTERRUPTED))
        .replace("__LOADING_DEFAULT__", &encode_text(messages::LOADING_SEARCH))
}

fn js_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

const MAIN_UI_HTML: &str = r#"<!doctype html>
<html lang="ja">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>商品提案書メーカー</title>
  <style>
    * { box-sizing: border-box; }
    body {
      margin: 0;
      color: #333;
      background: #f4f6f8;
      font-family: "Noto Sans JP", "Hiragino Kaku Gothic ProN", "Yu Gothic UI", sans-serif;
      font-size: 14px;
    }
    .layout {
      display: grid;
      grid-template-columns: 380px 1fr;
      gap: 20px;
      padding: 20px;
      min-height: 100vh;
    }
    @media (max-width: 999px) {
      .layout { grid-template-columns: 1fr; }
    }
    .panel {
      background: #fff;
      border-radius: 8px;
      padding: 16px;
      box-shadow: 0 2px 8px rgba(0,0,0,0.06);
      align-self: start;
    }
    .panel h2 { margin: 0 0 12px; font-size: 16px; color: #2c3e50; }
    label { display: block; font-size: 12px; color: #555; margin: 10px 0 4px; }
    input {
      width: 100%;
      height: 34px;
      border: 1px solid #cfd6dd;
      border-radius: 4px;
      padding: 0 8px;
      font: inherit;
    }
    button {
      font: inherit;
      border: none;
      border-radius: 5px;
      padding: 9px 16px;
      cursor: pointer;
      background: #3498db;
      color: #fff;
      font-weight: bold;
    }
    button:disabled { opacity: 0.45; cursor: default; }
    .actions { margin-top: 14px; display: flex; gap: 8px; flex-wrap: wrap; }
    .hidden { display: none !important; }
    #image-selection-area { margin-top: 18px; }
    #image-grid {
      display: grid;
      grid-template-columns: repeat(4, 1fr);
      gap: 6px;
    }
    .image-item {
      border: 3px solid transparent;
      border-radius: 6px;
      overflow: hidden;
      cursor: pointer;
      background: #fafafa;
      aspect-ratio: 1 / 1;
    }
    .image-item img { width: 100%; height: 100%; object-fit: contain; display: block; }
    .image-item.selected { border-color: #e67e22; }
    #proposal-preview {
      background: #fff;
      min-height: 400px;
      padding: 35mm 20mm 20mm;
      box-shadow: 0 10px 30px rgba(0,0,0,0.08);
    }
    #proposal-preview .placeholder { color: #999; text-align: center; margin-top: 80px; }
    #loading-overlay {
      position: fixed;
      inset: 0;
      background: rgba(255,255,255,0.8);
      display: flex;
      align-items: center;
      justify-content: center;
      z-index: 2000;
    }
    #loading-text { font-weight: bold; color: #2c3e50; }
    [contenteditable="true"]:hover { outline: 1px dashed #9bb; }
    @media print {
      body { background: #fff; }
      .layout { display: block; padding: 0; }
      .panel, #loading-overlay { display: none !important; }
      #proposal-preview { box-shadow: none; }
    }
__PROPOSAL_STYLE__
  </style>
</head>
<body>
  <div class="layout">
    <section class="panel">
      <h2>商品情報</h2>
      <label for="product_name">商品名</label>
      <input id="product_name" type="text" autocomplete="off" />
      <label for="price">納品価格</label>
      <input id="price" type="text" autocomplete="off" />
      <label for="capacity">容量</label>
      <input id="capacity" type="text" autocomplete="off" />
      <div class="actions">
        <button id="search-btn" type="button">検索</button>
      </div>

      <div id="image-selection-area" class="hidden">
        <h2>画像を選択</h2>
        <div id="image-grid"></div>
        <div class="actions">
          <button id="generate-btn" type="button" disabled>提案書を生成</button>
          <button id="print-btn" type="button" class="hidden">印刷</button>
          <button id="export-btn" type="button" class="hidden">書き出し</button>
        </div>
      </div>
    </section>

    <main id="proposal-preview" class="proposal">
      <p class="placeholder">ここに提案書が表示されます</p>
    </main>
  </div>

  <div id="loading-overlay" class="hidden">
    <div id="loading-text">__LOADING_DEFAULT__</div>
  </div>

  <script>
    const LOADING_SEARCH = __LOADING_SEARCH__;
    const LOADING_GENERATE = __LOADING_GENERATE__;
    const SEARCH_FAILED = __SEARCH_FAILED__;
    const GENERATE_FAILED = __GENERATE_FAILED__;
    const SELECT_FAILED = __SELECT_FAILED__;

    const searchBtn = document.getElementById("search-btn");
    const generateBtn = document.getElementById("generate-btn");
    const printBtn = document.getElementById("print-btn");
    const exportBtn = document.getElementById("export-btn");
    const loadingOverlay = document.getElementById("loading-overlay");
    const loadingText = document.getElementById("loading-text");
    const imageSelectionArea = document.getElementById("image-selection-area");
    const imageGrid = document.getElementById("image-grid");
    const proposalPreview = document.getElementById("proposal-preview");
    const productNameInput = document.getElementById("product_name");
    const priceInput = document.getElementById("price");
    const capacityInput = document.getElementById("capacity");

    let generateEnabled = false;
    let pending = false;

    function showLoading(message) {
      loadingText.textContent = message;
      loadingOverlay.classList.remove("hidden");
    }

    function hideLoading() {
      loadingOverlay.classList.add("hidden");
    }

    function setPending(value) {
      pending = value;
      searchBtn.disabled = value;
      generateBtn.disabled = value || !generateEnabled;
    }

    async function apiGet(path) {
      const res = await fetch(path, { method: "GET" });
      const data = await res.json();
      if (!res.ok || !data.ok) {
        throw new Error(data.error || `HTTP ${res.status}`);
      }
      return data;
    }

    async function apiPost(path, body) {
      const res = await fetch(path, {
        method: "POST",
        headers: { "Content-Type": "application/json" },
        body: JSON.stringify(body),
      });
      const data = await res.json();
      if (!res.ok || !data.ok) {
        throw new Error(data.error || `HTTP ${res.status}`);
      }
      return data;
    }

    function applyUpdate(update) {
      if (typeof update.tiles_html === "string") {
        imageGrid.innerHTML = update.tiles_html;
      }
      imageGrid.querySelectorAll(".image-item").forEach((tile) => {
        tile.classList.toggle("selected", Number(tile.dataset.index) === update.selected_index);
      });
      if (update.show_selection_area) {
        imageSelectionArea.classList.remove("hidden");
      }

      generateEnabled = update.generate_enabled;
      generateBtn.disabled = pending || !generateEnabled;

      if (typeof update.preview_html === "string") {
        proposalPreview.innerHTML = update.preview_html;
        printBtn.classList.remove("hidden");
        exportBtn.classList.remove("hidden");
      }
      if (typeof update.hero_swap === "string") {
        const hero = proposalPreview.querySelector(".product-image img");
        if (hero) {
          hero.src = update.hero_swap;
        }
      }
      if (update.scroll_into_view) {
        proposalPreview.scrollIntoView({ behavior: "smooth" });
      }
      if (update.alert) {
        alert(update.alert);
      }
    }

    async function runAction(message, failureMessage, action) {
      if (pending) {
        return;
      }
      setPending(true);
      if (message) {
        showLoading(message);
      }
      try {
        applyUpdate(await action());
      } catch (error) {
        console.error(error);
        alert(failureMessage);
      } finally {
        hideLoading();
        setPending(false);
      }
    }

    searchBtn.addEventListener("click", () =>
      runAction(productNameInput.value.trim() ? LOADING_SEARCH : null, SEARCH_FAILED, () =>
        apiPost("/app/search", { product_name: productNameInput.value })
      )
    );

    generateBtn.addEventListener("click", () =>
      runAction(LOADING_GENERATE, GENERATE_FAILED, () =>
        apiPost("/app/generate", {
          product_name: productNameInput.value,
          price: priceInput.value,
          capacity: capacityInput.value,
          viewport_width: window.innerWidth,
        })
      )
    );

    imageGrid.addEventListener("click", (event) => {
      const tile = event.target.closest(".image-item");
      if (!tile) {
        return;
      }
      runAction(null, SELECT_FAILED, () =>
        apiPost("/app/select", { index: Number(tile.dataset.index) })
      );
    });

    printBtn.addEventListener("click", () => window.print());
    exportBtn.addEventListener("click", () => window.open("/app/export", "_blank"));

    apiGet("/app/init")
      .then(applyUpdate)
      .catch((error) => console.error(error));
  </script>
</body>
</html>
"#;
