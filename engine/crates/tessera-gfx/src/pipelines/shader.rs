use std::path::Path;

use anyhow::Context;

use crate::error::{GfxError, GfxResult};
use crate::native::ShaderVisibility;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GfxShaderKind {
    Vertex,
    Pixel,
}

impl GfxShaderKind {
    #[inline]
    pub fn visibility(self) -> ShaderVisibility {
        match self {
            GfxShaderKind::Vertex => ShaderVisibility::Vertex,
            GfxShaderKind::Pixel => ShaderVisibility::Pixel,
        }
    }
}

/// 预编译好的 shader 字节码（DXIL / DXBC）
///
/// 不持有原生对象，字节码在创建 pipeline 时才交给驱动
#[derive(Clone, Debug)]
pub struct GfxShader {
    kind: GfxShaderKind,
    bytecode: Vec<u8>,
    entry_point: String,
}

// new & init
impl GfxShader {
    pub fn new(kind: GfxShaderKind, bytecode: Vec<u8>, entry_point: impl Into<String>) -> GfxResult<Self> {
        if bytecode.is_empty() {
            return Err(GfxError::invalid_argument("bytecode", "shader bytecode must not be empty"));
        }
        let entry_point = entry_point.into();
        if entry_point.is_empty() {
            return Err(GfxError::invalid_argument("entry_point", "shader entry point must not be empty"));
        }
        Ok(Self {
            kind,
            bytecode,
            entry_point,
        })
    }

    /// # param
    /// * path - 编译好的 shader 文件路径
    pub fn from_file(kind: GfxShaderKind, path: &Path, entry_point: &str) -> anyhow::Result<Self> {
        let bytecode = std::fs::read(path).with_context(|| format!("读取 shader 文件失败: {}", path.display()))?;
        let shader = Self::new(kind, bytecode, entry_point)
            .with_context(|| format!("无效的 shader 文件: {}", path.display()))?;
        log::info!("load {:?} shader: {}", kind, path.display());
        Ok(shader)
    }
}

// getters
impl GfxShader {
    #[inline]
    pub fn kind(&self) -> GfxShaderKind {
        self.kind
    }

    #[inline]
    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    #[inline]
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
}
