//! Permit2 签名在 calldata 尾部的拼接规则。

use alloy::primitives::{Bytes, U256};

/// 按聚合器要求的布局拼接：
/// `原始 calldata || uint256 大端(签名字节长度) || 签名字节`。
///
/// 长度前缀固定 32 字节、无符号、大端，写的是字节长度
/// （通常 65），与签名实际多长无关。
pub fn append_permit2_signature(data: &Bytes, signature: &Bytes) -> Bytes {
    let length_prefix = U256::from(signature.len()).to_be_bytes::<32>();
    let mut assembled = Vec::with_capacity(data.len() + 32 + signature.len());
    assembled.extend_from_slice(data);
    assembled.extend_from_slice(&length_prefix);
    assembled.extend_from_slice(signature);
    Bytes::from(assembled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(data: &[u8]) -> Bytes {
        Bytes::from(data.to_vec())
    }

    #[test]
    fn layout_is_data_then_be32_length_then_signature() {
        let data = bytes(&[0x12, 0x34]);
        let signature = bytes(&[0xaa; 65]);
        let assembled = append_permit2_signature(&data, &signature);

        assert_eq!(&assembled[..2], &[0x12, 0x34]);
        let mut expected_prefix = [0u8; 32];
        expected_prefix[31] = 65;
        assert_eq!(&assembled[2..34], &expected_prefix);
        assert_eq!(&assembled[34..], &[0xaa; 65][..]);
    }

    #[test]
    fn prefix_is_always_32_bytes() {
        for len in [0usize, 1, 64, 65, 300] {
            let assembled = append_permit2_signature(&bytes(&[0x01]), &bytes(&vec![0u8; len]));
            assert_eq!(assembled.len(), 1 + 32 + len);
            // 低位字节承载长度，高位补零。
            assert_eq!(assembled[1 + 31] as usize, len & 0xff);
            assert_eq!(assembled[1 + 30] as usize, (len >> 8) & 0xff);
        }
    }

    #[test]
    fn hex_rendering_matches_expected_character_count() {
        // 0x1234 + 65 字节签名 => "0x" 后 4 + 64 + 130 个十六进制字符。
        let assembled = append_permit2_signature(&bytes(&[0x12, 0x34]), &bytes(&[0x41; 65]));
        let rendered = assembled.to_string();
        assert!(rendered.starts_with("0x1234"));
        assert_eq!(rendered.len(), 2 + 4 + 64 + 130);
        assert_eq!(
            &rendered[6..70],
            "0000000000000000000000000000000000000000000000000000000000000041"
        );
    }

    #[test]
    fn empty_calldata_still_gets_prefixed() {
        let assembled = append_permit2_signature(&Bytes::new(), &bytes(&[0x01, 0x02]));
        assert_eq!(assembled.len(), 34);
        assert_eq!(assembled[31], 2);
        assert_eq!(&assembled[32..], &[0x01, 0x02]);
    }
}
