//! Background execution for asynchronous refreshes.

pub(crate) mod pool;
