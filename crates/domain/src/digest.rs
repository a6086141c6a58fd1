use sha2::{Digest, Sha256};

/// 计算文档字节内容的确定性指纹（sha256 十六进制）
///
/// 该指纹同时作为模板模式标识符和知识库去重键。
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_bytes_identical_hash() {
        let a = content_hash(b"liquidation resolution sample");
        let b = content_hash(b"liquidation resolution sample");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_different_bytes_different_hash() {
        assert_ne!(content_hash(b"doc-a"), content_hash(b"doc-b"));
    }
}
