use crate::category::Category;

pub const DEFAULT_FORMATTED_PREFIX: &str = "formatted";

pub fn category_prefix(base_prefix: &str, category: Category) -> String {
    let trimmed = base_prefix.trim_matches('/');
    if trimmed.is_empty() {
        category.as_str().to_string()
    } else {
        format!("{trimmed}/{}", category.as_str())
    }
}

pub fn formatted_object_key(base_prefix: &str, category: Category, record_id: &str) -> String {
    format!("{}/{record_id}.json", category_prefix(base_prefix, category))
}
