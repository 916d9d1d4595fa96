use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::basic::color::GfxColor;
use crate::error::{GfxError, GfxResult};
use crate::native::GfxFormat;

/// placed resource 的默认对齐，memory block 的大小必须是它的整数倍
pub const PLACEMENT_ALIGNMENT: u64 = 64 * 1024;

/// GFX 层的全部配置，对应 `config/tessera.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GfxConfig {
    pub provider: GfxProviderConfig,
    pub device: GfxDeviceConfig,
    pub memory: GfxMemoryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GfxProviderConfig {
    /// 创建 factory 时是否打开 debug layer
    pub enable_debug_layer: bool,
}

impl Default for GfxProviderConfig {
    fn default() -> Self {
        Self {
            enable_debug_layer: cfg!(debug_assertions),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GfxDeviceConfig {
    /// swap chain buffer 的数量，也是 context 的数量
    pub back_buffer_count: u32,
    pub back_buffer_format: GfxFormat,
    /// Present 的 sync interval，0 表示不等待垂直同步
    pub sync_interval: u32,
    pub clear_color: [f32; 4],
}

impl Default for GfxDeviceConfig {
    fn default() -> Self {
        Self {
            back_buffer_count: 2,
            back_buffer_format: GfxFormat::B8G8R8A8Unorm,
            sync_interval: 1,
            clear_color: GfxColor::CORNFLOWER_BLUE.to_array(),
        }
    }
}

impl GfxDeviceConfig {
    #[inline]
    pub fn clear_color(&self) -> GfxColor {
        GfxColor::from(self.clear_color)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GfxMemoryConfig {
    /// 新建 memory block 的默认大小（字节）
    pub block_size: u64,
}

impl Default for GfxMemoryConfig {
    fn default() -> Self {
        Self {
            block_size: 64 * 1024 * 1024,
        }
    }
}

// new & init
impl GfxConfig {
    /// 解析并检查配置
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: GfxConfig = toml::from_str(content).context("解析 TOML 配置失败")?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).with_context(|| format!("读取配置文件失败: {:?}", path.as_ref()))?;
        Self::from_toml_str(&content).with_context(|| format!("加载配置文件失败: {:?}", path.as_ref()))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path.as_ref(), content).with_context(|| format!("写入配置文件失败: {:?}", path.as_ref()))?;
        Ok(())
    }
}

// tools
impl GfxConfig {
    pub fn validate(&self) -> GfxResult<()> {
        let device = &self.device;
        if !(2..=16).contains(&device.back_buffer_count) {
            return Err(GfxError::invalid_argument(
                "device.back_buffer_count",
                format!("{} is not in 2..=16", device.back_buffer_count),
            ));
        }
        if device.back_buffer_format == GfxFormat::Unknown {
            return Err(GfxError::invalid_argument("device.back_buffer_format", "format must be known"));
        }
        if device.sync_interval > 4 {
            return Err(GfxError::invalid_argument(
                "device.sync_interval",
                format!("{} is not in 0..=4", device.sync_interval),
            ));
        }

        let block_size = self.memory.block_size;
        if block_size == 0 || block_size % PLACEMENT_ALIGNMENT != 0 {
            return Err(GfxError::invalid_argument(
                "memory.block_size",
                format!("{block_size} is not a non-zero multiple of {PLACEMENT_ALIGNMENT}"),
            ));
        }
        Ok(())
    }
}
