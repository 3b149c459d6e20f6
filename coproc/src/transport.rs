//! Channel delivering transactions to the coprocessor.
//!
//! Implementors perform exactly one blocking exchange per `send`. There is no
//! pipelining: a transaction owns the channel until its result is back.

use std::sync::{Arc, Mutex, TryLockError};

use crate::codec::Transaction;
use crate::error::TransportError;

pub trait Transport {
    /// Deliver a transaction and return it with `result` filled in
    ///
    /// For writes the result carries no meaning.
    fn send(&mut self, transaction: Transaction) -> Result<Transaction, TransportError>;

    /// Give the channel back to the system
    ///
    /// Called exactly once, by `Session::terminate`.
    fn release(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, transaction: Transaction) -> Result<Transaction, TransportError> {
        (**self).send(transaction)
    }

    fn release(&mut self) -> Result<(), TransportError> {
        (**self).release()
    }
}

/// Transport shared between threads
///
/// Each `send` holds the lock for a single transaction, so concurrent users
/// never interleave inside an exchange.
#[derive(Debug)]
pub struct Shared<T>(Arc<Mutex<T>>);

impl<T> Shared<T> {
    pub fn new(inner: T) -> Self {
        Self(Arc::new(Mutex::new(inner)))
    }

    /// Run `f` with exclusive access to the inner transport
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, TransportError> {
        let mut guard = self.0.lock().map_err(|_| TransportError::Poisoned)?;
        Ok(f(&mut guard))
    }
}

impl<T: Transport> Shared<T> {
    /// Release without waiting for the lock
    ///
    /// `Ok(false)` when a transaction currently holds the channel.
    pub fn try_release(&self) -> Result<bool, TransportError> {
        match self.0.try_lock() {
            Ok(mut guard) => guard.release().map(|_| true),
            Err(TryLockError::WouldBlock) => Ok(false),
            Err(TryLockError::Poisoned(_)) => Err(TransportError::Poisoned),
        }
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: Transport> Transport for Shared<T> {
    fn send(&mut self, transaction: Transaction) -> Result<Transaction, TransportError> {
        self.with(|inner| inner.send(transaction))?
    }

    fn release(&mut self) -> Result<(), TransportError> {
        self.with(|inner| inner.release())?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RegisterWrite;
    use crate::register::RegisterId;
    use crate::sim::SimCoprocessor;

    #[test]
    fn shared_clones_reach_same_channel() {
        let shared = Shared::new(SimCoprocessor::new());
        let mut a = shared.clone();
        let mut b = shared.clone();

        let t = RegisterWrite::V { x: 2, value: 0x42 }.encode().unwrap();
        a.send(t).unwrap();
        let read = b
            .send(Transaction::read(RegisterId::V(2), 0))
            .unwrap();

        assert_eq!(read.result, 0x42);
        assert_eq!(shared.with(|sim| sim.history().len()).unwrap(), 2);
    }

    #[test]
    fn try_release_skips_busy_channel() {
        let shared = Shared::new(SimCoprocessor::new());
        let other = shared.clone();

        let busy = shared.with(|_| other.try_release()).unwrap();
        assert_eq!(busy.unwrap(), false);
        assert_eq!(shared.with(|sim| sim.releases()).unwrap(), 0);

        assert_eq!(other.try_release().unwrap(), true);
        assert_eq!(shared.with(|sim| sim.releases()).unwrap(), 1);
    }

    #[test]
    fn boxed_transport_forwards_release() {
        let mut boxed: Box<dyn Transport> = Box::new(SimCoprocessor::new());
        boxed.release().unwrap();
        assert!(boxed.send(Transaction::read(RegisterId::I, 0)).is_err());
    }
}
