//! 通用工具函数

/// 规范化国家标识符（去除空白与分隔符并转为大写）
pub fn normalize_national_id(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

/// 校验NHS号码的Mod-11校验位
pub fn is_valid_nhs_number(value: &str) -> bool {
    let normalized = normalize_national_id(value);
    if normalized.len() != 10 || !normalized.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    let digits: Vec<u32> = normalized.chars().filter_map(|c| c.to_digit(10)).collect();
    let weighted_sum: u32 = digits[..9]
        .iter()
        .enumerate()
        .map(|(i, d)| d * (10 - i as u32))
        .sum();

    let check_digit = match 11 - (weighted_sum % 11) {
        11 => 0,
        10 => return false, // 校验位10为无效号码
        n => n,
    };

    check_digit == digits[9]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_national_id() {
        assert_eq!(normalize_national_id("943 476 5919"), "9434765919");
        assert_eq!(normalize_national_id("943-476-5919"), "9434765919");
        assert_eq!(normalize_national_id("ukrr123"), "UKRR123");
    }

    #[test]
    fn test_is_valid_nhs_number() {
        // 已知有效的NHS测试号码
        assert!(is_valid_nhs_number("9434765919"));
        assert!(is_valid_nhs_number("943 476 5919"));

        assert!(!is_valid_nhs_number("9434765918")); // 校验位错误
        assert!(!is_valid_nhs_number(""));
        assert!(!is_valid_nhs_number("12345"));
        assert!(!is_valid_nhs_number("943476591X"));
    }
}
