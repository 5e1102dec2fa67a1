// i18n.rs — 运行时多语言字符串
//
// - 字符串表：assets/i18n/<lang>.json（exe 目录优先，其次工作目录）
// - 找不到时回退到编译进程序的英文表
// - tr("key") / tr_with("key", &[("name", ...)])，{name} 为占位符

use once_cell::sync::{Lazy, OnceCell};
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::RwLock,
};

pub const LANGUAGES: [(&str, &str); 2] = [("en", "English"), ("es", "Español")];

static BUILTIN_EN: Lazy<HashMap<String, String>> = Lazy::new(|| {
    serde_json::from_str(include_str!("../assets/i18n/en.json")).unwrap_or_default()
});

struct Table {
    map: HashMap<String, String>,
}

static TABLE: OnceCell<RwLock<Table>> = OnceCell::new();

fn lang_file_candidates(lang: &str) -> Vec<PathBuf> {
    let file = format!("{lang}.json");
    let mut out = Vec::new();
    if let Some(dir) = std::env::current_exe().ok().and_then(|e| e.parent().map(|p| p.to_path_buf())) {
        out.push(dir.join("assets").join("i18n").join(&file));
    }
    out.push(PathBuf::from("assets").join("i18n").join(&file));
    out
}

fn load_lang(lang: &str) -> HashMap<String, String> {
    for path in lang_file_candidates(lang) {
        let Ok(text) = std::fs::read_to_string(&path) else {
            continue;
        };
        match serde_json::from_str(&text) {
            Ok(map) => return map,
            Err(e) => log::warn!("ignoring malformed locale file {:?}: {e}", path),
        }
    }
    HashMap::new()
}

/// 切换语言；可重复调用。
pub fn init(lang: &str) {
    let table = Table { map: load_lang(lang) };
    match TABLE.get() {
        Some(lock) => {
            if let Ok(mut w) = lock.write() {
                *w = table;
            }
        }
        None => {
            let _ = TABLE.set(RwLock::new(table));
        }
    }
}

/// 查找键；缺失时依次回退到内置英文与键名本身。
pub fn tr(key: &str) -> String {
    if let Some(v) = TABLE
        .get()
        .and_then(|l| l.read().ok())
        .and_then(|t| t.map.get(key).cloned())
    {
        return v;
    }
    BUILTIN_EN.get(key).cloned().unwrap_or_else(|| key.to_string())
}

pub fn tr_with(key: &str, args: &[(&str, String)]) -> String {
    args.iter().fold(tr(key), |s, (k, v)| s.replace(&format!("{{{k}}}"), v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_returns_key() {
        assert_eq!(tr("no.such.key"), "no.such.key");
    }

    #[test]
    fn builtin_table_covers_title() {
        assert!(BUILTIN_EN.contains_key("app.title"));
    }

    #[test]
    fn placeholders_are_substituted() {
        let s = tr_with("status.scene", &[("index", "2".into()), ("count", "3".into())]);
        assert!(s.contains('2') && s.contains('3'));
        assert!(!s.contains("{index}"));
    }
}
