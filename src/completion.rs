// Copyright 2018 The copromise Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The completion algebra shared by promises and futures

use std::error;
use std::fmt;
use std::sync::Arc;

use future::Future;

/// The outcome of an asynchronous computation.
///
/// `Success`, `Fail` and `Cancelled` are terminal: the first one of them
/// applied to a future sticks forever. `CompleteUsing` is transient and only
/// legal as the value a completion handler (or `Promise::complete_with`)
/// produces; it tells the engine to adopt another future's eventual outcome
/// instead. A completed future never stores `CompleteUsing`.
#[derive(Clone)]
pub enum Completion<T> {
    Success(T),
    Fail(FutureError),
    Cancelled(Option<CancelToken>),
    CompleteUsing(Future<T>),
}

impl<T> Completion<T> {
    #[inline]
    pub fn is_success(&self) -> bool {
        match *self {
            Completion::Success(..) => true,
            _ => false,
        }
    }

    #[inline]
    pub fn is_fail(&self) -> bool {
        match *self {
            Completion::Fail(..) => true,
            _ => false,
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        match *self {
            Completion::Cancelled(..) => true,
            _ => false,
        }
    }

    #[inline]
    pub fn is_complete_using(&self) -> bool {
        match *self {
            Completion::CompleteUsing(..) => true,
            _ => false,
        }
    }

    /// Borrow the success value, if any
    pub fn value(&self) -> Option<&T> {
        match *self {
            Completion::Success(ref value) => Some(value),
            _ => None,
        }
    }

    /// Take the success value, if any
    pub fn into_value(self) -> Option<T> {
        match self {
            Completion::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Borrow the failure payload, if any
    pub fn error(&self) -> Option<&FutureError> {
        match *self {
            Completion::Fail(ref error) => Some(error),
            _ => None,
        }
    }

    /// Re-type a non-success completion so it can be forwarded downstream.
    ///
    /// Panics on `Success` and `CompleteUsing`: those carry the payload type
    /// and cannot be forwarded untouched. The engine only calls this after
    /// matching the success case away.
    pub fn convert<S>(self) -> Completion<S> {
        match self {
            Completion::Fail(error) => Completion::Fail(error),
            Completion::Cancelled(token) => Completion::Cancelled(token),
            Completion::Success(..) => panic!("cannot convert a success completion"),
            Completion::CompleteUsing(..) => panic!("cannot convert a pending indirection"),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Completion::Success(ref value) => write!(f, "Success({:?})", value),
            Completion::Fail(ref error) => write!(f, "Fail({:?})", error),
            Completion::Cancelled(ref token) => write!(f, "Cancelled({:?})", token),
            Completion::CompleteUsing(..) => write!(f, "CompleteUsing(..)"),
        }
    }
}

/// Opaque token identifying a cancellation request.
///
/// Tokens are compared by identity: two clones of the same token are equal,
/// two separately created tokens never are.
#[derive(Clone)]
pub struct CancelToken(Arc<()>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken(Arc::new(()))
    }
}

impl PartialEq for CancelToken {
    fn eq(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for CancelToken {}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CancelToken({:p})", &*self.0)
    }
}

/// Cheaply cloneable, opaque failure payload carried by `Completion::Fail`.
#[derive(Clone)]
pub struct FutureError(Arc<dyn error::Error + Send + Sync>);

impl FutureError {
    pub fn new<E>(error: E) -> FutureError
        where E: error::Error + Send + Sync + 'static
    {
        FutureError(Arc::new(error))
    }

    /// Access the underlying error as a `&dyn Error`
    pub fn payload(&self) -> &(dyn error::Error + 'static) {
        &*self.0
    }

    /// True if this failure marks a `CompleteUsing` chain that loops back on
    /// itself and can therefore never produce a terminal value.
    pub fn is_indirection_cycle(&self) -> bool {
        self.payload().downcast_ref::<IndirectionCycleError>().is_some()
    }

    /// True if this failure was produced by dropping a promise that never
    /// completed its future.
    pub fn is_broken_promise(&self) -> bool {
        self.payload().downcast_ref::<BrokenPromiseError>().is_some()
    }

    pub(crate) fn indirection_cycle() -> FutureError {
        FutureError::new(IndirectionCycleError)
    }

    pub(crate) fn broken_promise() -> FutureError {
        FutureError::new(BrokenPromiseError)
    }
}

impl fmt::Display for FutureError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for FutureError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FutureError({:?})", self.0)
    }
}

impl From<String> for FutureError {
    fn from(message: String) -> FutureError {
        FutureError::new(StringError(message))
    }
}

impl<'a> From<&'a str> for FutureError {
    fn from(message: &'a str) -> FutureError {
        FutureError::new(StringError(message.to_owned()))
    }
}

#[derive(Debug)]
struct StringError(String);

impl fmt::Display for StringError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl error::Error for StringError {}

/// A `CompleteUsing` chain closed into a loop and cannot terminate.
#[derive(Debug)]
pub struct IndirectionCycleError;

impl fmt::Display for IndirectionCycleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("completion was deferred along a cyclic indirection chain")
    }
}

impl error::Error for IndirectionCycleError {}

/// The promise owning a future was dropped before completing it.
#[derive(Debug)]
pub struct BrokenPromiseError;

impl fmt::Display for BrokenPromiseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("promise was dropped without completing its future")
    }
}

impl error::Error for BrokenPromiseError {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn completion_accessors() {
        let c: Completion<u32> = Completion::Success(42);
        assert!(c.is_success());
        assert_eq!(c.value(), Some(&42));
        assert_eq!(c.into_value(), Some(42));

        let c: Completion<u32> = Completion::Fail(FutureError::from("nope"));
        assert!(c.is_fail());
        assert_eq!(c.error().unwrap().to_string(), "nope");

        let c: Completion<u32> = Completion::Cancelled(None);
        assert!(c.is_cancelled());
    }

    #[test]
    fn convert_keeps_the_terminal_kind() {
        let c: Completion<u32> = Completion::Fail(FutureError::from("nope"));
        let converted: Completion<String> = c.convert();
        assert!(converted.is_fail());

        let token = CancelToken::new();
        let c: Completion<u32> = Completion::Cancelled(Some(token.clone()));
        match c.convert::<String>() {
            Completion::Cancelled(Some(ref t)) => assert_eq!(*t, token),
            _ => panic!("expected the cancellation to survive conversion"),
        }
    }

    #[test]
    fn tokens_compare_by_identity() {
        let a = CancelToken::new();
        let b = CancelToken::new();
        assert_eq!(a, a.clone());
        assert!(a != b);
    }

    #[test]
    fn error_kinds_are_distinguishable() {
        assert!(FutureError::indirection_cycle().is_indirection_cycle());
        assert!(!FutureError::indirection_cycle().is_broken_promise());
        assert!(FutureError::broken_promise().is_broken_promise());
        assert!(!FutureError::from("nope").is_indirection_cycle());
    }
}
