//! Host-function descriptors.
//!
//! A `HostFunction` is a callback together with the call shape it was
//! declared with. The set of shapes is closed; the dispatcher pattern
//! matches on the variant and rejects calls that arrive through another
//! path or with a different argument count.

use std::fmt;

use tracebridge_hostapi::CallShape;

type Notify1 = Box<dyn Fn(i32) + Send + Sync>;
type Notify2 = Box<dyn Fn(i32, i32) + Send + Sync>;
type Notify3 = Box<dyn Fn(i32, i32, i32) + Send + Sync>;
type NarrowFn = Box<dyn Fn(&[i32]) -> i32 + Send + Sync>;
type WideFn = Box<dyn Fn(&[i64]) -> i32 + Send + Sync>;

/// A host callback and its declared shape.
pub enum HostFunction {
    Notify1(Notify1),
    Notify2(Notify2),
    Notify3(Notify3),
    /// `params` i32 arguments, i32 result.
    I32 { params: usize, callback: NarrowFn },
    /// `params` i64 arguments, i32 result.
    I64 { params: usize, callback: WideFn },
}

impl HostFunction {
    pub fn notify1(f: impl Fn(i32) + Send + Sync + 'static) -> Self {
        Self::Notify1(Box::new(f))
    }

    pub fn notify2(f: impl Fn(i32, i32) + Send + Sync + 'static) -> Self {
        Self::Notify2(Box::new(f))
    }

    pub fn notify3(f: impl Fn(i32, i32, i32) + Send + Sync + 'static) -> Self {
        Self::Notify3(Box::new(f))
    }

    pub fn i32(params: usize, f: impl Fn(&[i32]) -> i32 + Send + Sync + 'static) -> Self {
        Self::I32 {
            params,
            callback: Box::new(f),
        }
    }

    pub fn i64(params: usize, f: impl Fn(&[i64]) -> i32 + Send + Sync + 'static) -> Self {
        Self::I64 {
            params,
            callback: Box::new(f),
        }
    }

    pub fn shape(&self) -> CallShape {
        match self {
            Self::Notify1(_) => CallShape::Notify { arity: 1 },
            Self::Notify2(_) => CallShape::Notify { arity: 2 },
            Self::Notify3(_) => CallShape::Notify { arity: 3 },
            Self::I32 { params, .. } => CallShape::I32 { params: *params },
            Self::I64 { params, .. } => CallShape::I64 { params: *params },
        }
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HostFunction").field(&self.shape()).finish()
    }
}
