//! Read-only lookups in the vendor's transaction datastore.
//!
//! These never touch hardware; a miss resolves `None`.

use crate::bridge::PosBridge;
use crate::error::Result;
use crate::records::TransactionRecord;
use crate::settle::Pending;

impl PosBridge {
    /// Every stored transaction, newest first.
    pub fn get_all_transactions_order_by_id_desc(&self) -> Pending<Vec<TransactionRecord>> {
        self.query("getAllTransactionsOrderByIdDesc", || {
            Ok(self.store.all_order_by_id_desc()?)
        })
    }

    pub fn get_last_transaction(&self) -> Pending<Option<TransactionRecord>> {
        self.query("getLastTransaction", || match self.store.last_transaction_id()? {
            Some(id) => Ok(self.store.find_by_id(id)?),
            None => Ok(None),
        })
    }

    pub fn find_transaction_with_authorization_code(
        &self,
        authorization_code: &str,
    ) -> Pending<Option<TransactionRecord>> {
        self.query("findTransactionWithAuthorizationCode", || {
            Ok(self.store.find_by_authorization_code(authorization_code)?)
        })
    }

    /// Looks the key up as an acquirer transaction key; the datastore has no
    /// index on initiator keys.
    pub fn find_transaction_with_initiator_transaction_key(
        &self,
        key: &str,
    ) -> Pending<Option<TransactionRecord>> {
        self.query("findTransactionWithInitiatorTransactionKey", || {
            Ok(self.store.find_by_atk(key)?)
        })
    }

    pub fn find_transaction_with_id(&self, id: u32) -> Pending<Option<TransactionRecord>> {
        self.query("findTransactionWithId", || Ok(self.store.find_by_id(id)?))
    }

    fn query<T, F>(&self, label: &'static str, lookup: F) -> Pending<T>
    where
        F: FnOnce() -> Result<T>,
    {
        self.run(label, |settlement| {
            settlement.resolve(lookup()?);
            Ok(())
        })
    }
}
