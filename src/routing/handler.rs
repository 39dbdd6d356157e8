use std::future::Future;

use futures::FutureExt;
use futures::future::{BoxFuture, ready};

use crate::client::Message;

/// Processes messages claimed by a router binding.
///
/// Implemented for every `Fn(Message) -> impl Future<Output = ()>`; wrap
/// synchronous closures with [`handler_fn`].
pub trait Handler: Send + Sync + 'static {
	fn call(&self, message: Message) -> BoxFuture<'static, ()>;
}

impl<F, Fut> Handler for F
where
	F: Fn(Message) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = ()> + Send + 'static,
{
	fn call(&self, message: Message) -> BoxFuture<'static, ()> {
		self(message).boxed()
	}
}

/// Handler from a synchronous closure.
pub fn handler_fn<F>(f: F) -> SyncHandler<F>
where
	F: Fn(Message) + Send + Sync + 'static,
{
	SyncHandler(f)
}

/// See [`handler_fn`].
#[derive(Clone)]
pub struct SyncHandler<F>(F);

impl<F> Handler for SyncHandler<F>
where
	F: Fn(Message) + Send + Sync + 'static,
{
	fn call(&self, message: Message) -> BoxFuture<'static, ()> {
		(self.0)(message);
		ready(()).boxed()
	}
}
