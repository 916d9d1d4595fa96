use std::rc::Rc;

use crate::error::{GfxError, GfxResult};
use crate::native::{GfxFormat, NativeIndexBufferView, NativeVertexBufferView};
use crate::resources::buffer::GfxBuffer;
use crate::resources::resource::GfxResource;
use crate::resources::texture::GfxTexture;

/// buffer 中的一段，作为 vertex / index / constant 输入
#[derive(Clone)]
pub struct GfxBufferView {
    buffer: Rc<GfxBuffer>,
    offset: u64,
    size: u64,
    stride: u32,
}

// new & init
impl GfxBufferView {
    pub fn new(buffer: Rc<GfxBuffer>, offset: u64, size: u64, stride: u32) -> GfxResult<Self> {
        if size == 0 {
            return Err(GfxError::invalid_argument("size", "buffer view must not be empty"));
        }
        if offset.checked_add(size).is_none_or(|end| end > buffer.size()) {
            return Err(GfxError::invalid_argument(
                "range",
                format!("[{offset}, {offset}+{size}) is out of bounds of {} ({} bytes)", buffer.name(), buffer.size()),
            ));
        }
        if size > u32::MAX as u64 {
            return Err(GfxError::invalid_argument("size", format!("buffer view of {size} bytes is too large")));
        }
        if stride != 0 && size % stride as u64 != 0 {
            return Err(GfxError::invalid_argument(
                "stride",
                format!("view size {size} is not a multiple of stride {stride}"),
            ));
        }
        Ok(Self {
            buffer,
            offset,
            size,
            stride,
        })
    }

    /// 覆盖整个 buffer，使用 buffer 自身的 stride
    pub fn whole(buffer: Rc<GfxBuffer>) -> GfxResult<Self> {
        let (size, stride) = (buffer.size(), buffer.stride());
        Self::new(buffer, 0, size, stride)
    }
}

// getters
impl GfxBufferView {
    #[inline]
    pub fn buffer(&self) -> &Rc<GfxBuffer> {
        &self.buffer
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// stride 为 0 时没有元素结构，返回 0
    #[inline]
    pub fn element_count(&self) -> u32 {
        if self.stride == 0 { 0 } else { (self.size / self.stride as u64) as u32 }
    }

    pub fn gpu_address(&self) -> GfxResult<u64> {
        Ok(self.buffer.gpu_address()? + self.offset)
    }

    pub fn vertex_buffer_view(&self) -> GfxResult<NativeVertexBufferView> {
        Ok(NativeVertexBufferView {
            gpu_address: self.gpu_address()?,
            size_in_bytes: self.size as u32,
            stride_in_bytes: self.stride,
        })
    }

    /// 2 字节 stride 对应 16 位索引，4 字节对应 32 位索引
    pub fn index_buffer_view(&self) -> GfxResult<NativeIndexBufferView> {
        let format = match self.stride {
            2 => GfxFormat::R16Uint,
            4 => GfxFormat::R32Uint,
            stride => {
                return Err(GfxError::invalid_argument(
                    "stride",
                    format!("index stride must be 2 or 4 bytes, got {stride}"),
                ));
            }
        };
        Ok(NativeIndexBufferView {
            gpu_address: self.gpu_address()?,
            size_in_bytes: self.size as u32,
            format,
        })
    }
}

/// 绑定到 pipeline 的一个输入资源
#[derive(Clone)]
pub enum GfxResourceBinding {
    /// 通过 GPU 地址绑定为 root CBV
    Buffer(GfxBufferView),
    /// 通过 SRV descriptor table 绑定
    Texture(Rc<GfxTexture>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::resource_state::{GfxBufferKind, GfxCpuAccess};
    use crate::test_utils::null_core;

    #[test]
    fn test_view_range() {
        let (_null, core) = null_core();
        let buffer =
            Rc::new(GfxBuffer::new(&core, GfxBufferKind::Vertex, GfxCpuAccess::None, 96, 12, "vb").unwrap());

        let whole = GfxBufferView::whole(buffer.clone()).unwrap();
        assert_eq!(whole.element_count(), 8);

        let part = GfxBufferView::new(buffer.clone(), 24, 36, 12).unwrap();
        assert_eq!(part.gpu_address().unwrap(), buffer.gpu_address().unwrap() + 24);
        assert_eq!(part.vertex_buffer_view().unwrap().size_in_bytes, 36);

        assert!(GfxBufferView::new(buffer.clone(), 90, 12, 12).is_err());
        assert!(GfxBufferView::new(buffer.clone(), 0, 10, 12).is_err());
        assert!(GfxBufferView::new(buffer, 0, 0, 12).is_err());
    }

    #[test]
    fn test_index_format_by_stride() {
        let (_null, core) = null_core();
        let index_view = |stride| {
            let buffer = GfxBuffer::new(&core, GfxBufferKind::Index, GfxCpuAccess::None, 24, stride, "ib").unwrap();
            GfxBufferView::whole(Rc::new(buffer)).unwrap().index_buffer_view()
        };

        assert_eq!(index_view(2).unwrap().format, GfxFormat::R16Uint);
        assert_eq!(index_view(4).unwrap().format, GfxFormat::R32Uint);
        assert!(matches!(index_view(8), Err(GfxError::InvalidArgument { name: "stride", .. })));
    }
}
