use uuid::Uuid;

/// 批次 ID，仅用于日志关联。
pub fn batch_id() -> String {
    let s = Uuid::new_v4().simple().to_string();
    format!("batch-{}", &s[..8])
}
