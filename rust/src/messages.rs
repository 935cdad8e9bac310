pub const ENTER_PRODUCT_NAME: &str = "商品名を入力してください";
pub const SELECT_IMAGE: &str = "画像を選択してください";
pub const NO_IMAGES_FOUND: &str = "画像が見つかりませんでした。";
pub const SEARCH_FAILED: &str = "検索中にエラーが発生しました。";
pub const GENERATE_FAILED: &str = "生成に失敗しました。もう一度試してください。";
pub const BUSY: &str = "処理中です。しばらくお待ちください。";
pub const UNKNOWN_IMAGE: &str = "選択された画像が見つかりません。もう一度検索してください。";
pub const INTERRUPTED: &str = "操作が中断されました。もう一度お試しください。";

pub const LOADING_SEARCH: &str = "商品情報と画像を検索中...";
pub const LOADING_GENERATE: &str = "提案書を生成中... (AIが考え中)";
