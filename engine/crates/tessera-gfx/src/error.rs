use crate::native::{NativeResult, NativeStatus};

/// GFX 层的错误
#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    /// 原生调用失败，不会重试
    #[error("native call {operation} failed: {status}")]
    ExternalCall {
        operation: &'static str,
        status: NativeStatus,
    },

    /// 参数不合法，在发起任何原生调用之前检查
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("{object} has been disposed")]
    Disposed { object: &'static str },

    /// 对象处于不允许该操作的状态，例如在 command list 关闭时录制命令
    #[error("{object} is {actual}, expected {expected}")]
    InvalidState {
        object: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("out of memory: requested {requested} bytes, {available} bytes available")]
    OutOfMemory { requested: u64, available: u64 },
}

pub type GfxResult<T> = Result<T, GfxError>;

impl GfxError {
    #[inline]
    pub fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }

    /// 如果是原生调用失败，返回对应的状态码
    pub fn native_status(&self) -> Option<NativeStatus> {
        match self {
            GfxError::ExternalCall { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// 把原生调用的结果转换为 [`GfxResult`]，并标记失败的原生操作
pub trait NativeResultExt<T> {
    fn or_external(self, operation: &'static str) -> GfxResult<T>;
}

impl<T> NativeResultExt<T> for NativeResult<T> {
    #[inline]
    fn or_external(self, operation: &'static str) -> GfxResult<T> {
        self.map_err(|status| GfxError::ExternalCall { operation, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_call_message() {
        let err = Err::<(), _>(NativeStatus::E_INVALIDARG).or_external("CreateHeap").unwrap_err();
        assert_eq!(err.to_string(), "native call CreateHeap failed: E_INVALIDARG (0x80070057)");
        assert_eq!(err.native_status(), Some(NativeStatus::E_INVALIDARG));
    }

    #[test]
    fn test_invalid_state_message() {
        let err = GfxError::InvalidState {
            object: "GfxContext",
            expected: "recording",
            actual: "closed",
        };
        assert_eq!(err.to_string(), "GfxContext is closed, expected recording");
        assert_eq!(err.native_status(), None);
    }
}
