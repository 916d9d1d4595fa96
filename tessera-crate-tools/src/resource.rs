use std::path::{Path, PathBuf};

/// 统一的工作区路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导）。
///
/// # 使用示例
/// ```ignore
/// let config = TesseraPath::config_path("tessera.toml");          // config/tessera.toml
/// let shader = TesseraPath::shader_build_path("triangle.vs");     // shader/.build/triangle.vs.cso
/// ```
pub struct TesseraPath {}
impl TesseraPath {
    /// 获取工作区根目录
    pub fn workspace_path() -> PathBuf {
        // tessera-crate-tools 直接位于工作区根目录下
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.parent().unwrap_or(manifest_dir).to_path_buf()
    }

    /// 获取 `config/` 目录下的文件路径
    pub fn config_path(filename: &str) -> PathBuf {
        Self::workspace_path().join("config").join(filename)
    }

    /// 获取 `shader/.build/` 目录下编译好的着色器路径（DXBC/DXIL）
    pub fn shader_build_path(name: &str) -> PathBuf {
        Self::workspace_path().join("shader").join(".build").join(format!("{name}.cso"))
    }

    pub fn target_path() -> PathBuf {
        Self::workspace_path().join("target")
    }
}
