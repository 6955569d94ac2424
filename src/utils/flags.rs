//! 运行时开关。
//!
//! 两阶段兑换与自助交付开关由外部提供，每次请求读取，服务内部不缓存。

use crate::config::RedemptionConfig;
use std::env;

pub trait FlagSource: Send + Sync {
    fn two_phase_enabled(&self) -> bool;
    fn self_deliver_enabled(&self) -> bool;
}

/// 每次调用读取环境变量 TWO_PHASE_ENABLED / SELF_DELIVER_ENABLED，
/// 未设置或无法解析时回退到配置文件的默认值
#[derive(Debug, Clone)]
pub struct EnvFlagSource {
    defaults: RedemptionConfig,
}

impl EnvFlagSource {
    pub fn new(defaults: RedemptionConfig) -> Self {
        Self { defaults }
    }
}

fn read_bool(name: &str) -> Option<bool> {
    match env::var(name).ok()?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

impl FlagSource for EnvFlagSource {
    fn two_phase_enabled(&self) -> bool {
        read_bool("TWO_PHASE_ENABLED").unwrap_or(self.defaults.two_phase_enabled)
    }

    fn self_deliver_enabled(&self) -> bool {
        read_bool("SELF_DELIVER_ENABLED").unwrap_or(self.defaults.self_deliver_enabled)
    }
}

/// 固定值开关（测试 / 嵌入式调用）
#[derive(Debug, Clone, Copy)]
pub struct StaticFlags {
    pub two_phase_enabled: bool,
    pub self_deliver_enabled: bool,
}

impl FlagSource for StaticFlags {
    fn two_phase_enabled(&self) -> bool {
        self.two_phase_enabled
    }

    fn self_deliver_enabled(&self) -> bool {
        self.self_deliver_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_flags_fall_back_to_defaults() {
        let flags = EnvFlagSource::new(RedemptionConfig {
            two_phase_enabled: true,
            self_deliver_enabled: false,
        });
        // 仅当测试环境未设置对应变量时才有意义
        if env::var("TWO_PHASE_ENABLED").is_err() {
            assert!(flags.two_phase_enabled());
        }
        if env::var("SELF_DELIVER_ENABLED").is_err() {
            assert!(!flags.self_deliver_enabled());
        }
    }
}
