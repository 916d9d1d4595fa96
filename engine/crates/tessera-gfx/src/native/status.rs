use std::fmt;

/// 原生调用的返回状态，形状和 HRESULT 一致
///
/// 负数表示失败，非负数表示成功
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeStatus(pub i32);

impl NativeStatus {
    pub const S_OK: Self = Self(0);
    pub const E_POINTER: Self = Self(0x8000_4003_u32 as i32);
    pub const E_FAIL: Self = Self(0x8000_4005_u32 as i32);
    pub const E_OUTOFMEMORY: Self = Self(0x8007_000E_u32 as i32);
    pub const E_INVALIDARG: Self = Self(0x8007_0057_u32 as i32);
    pub const DXGI_ERROR_INVALID_CALL: Self = Self(0x887A_0001_u32 as i32);
    pub const DXGI_ERROR_NOT_FOUND: Self = Self(0x887A_0002_u32 as i32);
    pub const DXGI_ERROR_DEVICE_REMOVED: Self = Self(0x887A_0005_u32 as i32);
    /// `WaitForSingleObject` 返回 `WAIT_FAILED` 时使用的状态
    pub const WAIT_FAILED: Self = Self(0xFFFF_FFFF_u32 as i32);

    #[inline]
    pub fn is_success(self) -> bool {
        self.0 >= 0
    }

    #[inline]
    pub fn code(self) -> u32 {
        self.0 as u32
    }

    fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::S_OK => "S_OK",
            Self::E_POINTER => "E_POINTER",
            Self::E_FAIL => "E_FAIL",
            Self::E_OUTOFMEMORY => "E_OUTOFMEMORY",
            Self::E_INVALIDARG => "E_INVALIDARG",
            Self::DXGI_ERROR_INVALID_CALL => "DXGI_ERROR_INVALID_CALL",
            Self::DXGI_ERROR_NOT_FOUND => "DXGI_ERROR_NOT_FOUND",
            Self::DXGI_ERROR_DEVICE_REMOVED => "DXGI_ERROR_DEVICE_REMOVED",
            Self::WAIT_FAILED => "WAIT_FAILED",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for NativeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} (0x{:08X})", self.code()),
            None => write!(f, "0x{:08X}", self.code()),
        }
    }
}

impl fmt::Debug for NativeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeStatus({self})")
    }
}

/// 原生调用的结果：失败时携带状态码
pub type NativeResult<T> = Result<T, NativeStatus>;

/// 原生等待的结果，超时不算错误
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeWaitStatus {
    Signaled,
    Timeout,
}

/// 原生等待接口里表示无限等待的毫秒数
pub const INFINITE_WAIT_MS: u32 = u32::MAX;
/// 单次原生等待能表达的最大有限毫秒数
pub const MAX_FINITE_WAIT_MS: u32 = INFINITE_WAIT_MS - 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(NativeStatus::DXGI_ERROR_NOT_FOUND.to_string(), "DXGI_ERROR_NOT_FOUND (0x887A0002)");
        assert_eq!(NativeStatus(0x8000_1234_u32 as i32).to_string(), "0x80001234");
    }

    #[test]
    fn test_status_success() {
        assert!(NativeStatus::S_OK.is_success());
        assert!(NativeStatus(1).is_success());
        assert!(!NativeStatus::E_FAIL.is_success());
    }
}
