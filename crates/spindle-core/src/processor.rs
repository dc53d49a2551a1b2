//! Processor - ワーカーが各アイテムに対して呼ぶ処理
//!
//! # 使用例
//! ```ignore
//! struct Resize;
//!
//! #[async_trait]
//! impl TaskProcessor<Image> for Resize {
//!     type Error = std::io::Error;
//!     async fn process(&self, image: Image) -> Result<(), Self::Error> {
//!         image.resize(640, 480).await
//!     }
//! }
//! ```

use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

/// Caller-supplied processing function for one work item.
///
/// Errors are the caller's concern: the pool counts and logs them but never
/// retries or suppresses them.
#[async_trait]
pub trait TaskProcessor<T>: Send + Sync + 'static {
    type Error: Display + Send + 'static;

    async fn process(&self, item: T) -> Result<(), Self::Error>;
}

/// Adapter that lets a closure act as a `TaskProcessor`.
pub struct FnProcessor<F, T> {
    f: F,
    _item: PhantomData<fn(T)>,
}

/// Wrap `f` so it can be handed to `Pool::new`.
pub fn processor_fn<T, F, Fut, E>(f: F) -> FnProcessor<F, T>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
    T: Send + 'static,
{
    FnProcessor {
        f,
        _item: PhantomData,
    }
}

#[async_trait]
impl<T, F, Fut, E> TaskProcessor<T> for FnProcessor<F, T>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
    T: Send + 'static,
{
    type Error = E;

    async fn process(&self, item: T) -> Result<(), E> {
        (self.f)(item).await
    }
}
