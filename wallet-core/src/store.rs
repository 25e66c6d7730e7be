//! Account store and transaction journal over RocksDB
//!
//! # Column Families
//!
//! - `users` - User records (key: user_id)
//! - `wallets` - Wallet records (key: wallet_id)
//! - `transactions` - Journal records (key: txn_id, UUIDv7 so keys are
//!   time-ordered)
//! - `indices` - Secondary indices enforcing uniqueness and serving lookups
//!
//! # Indices
//!
//! - `email|<email>` -> user_id (unique email)
//! - `uw|<user_id>` -> wallet_id (one wallet per user)
//! - `ref|<reference>` -> txn_id (unique transaction reference)
//! - `ut|<user_id><txn_id>` -> empty (per-user journal scan)
//!
//! All multi-record mutations commit through a single `WriteBatch`: either
//! every write lands or none does. Uniqueness checks run under a store-level
//! mutex so check-then-insert cannot race.

use crate::{
    config::Config,
    error::{Error, Result},
    types::{Transaction, TransactionKind, TransactionPage, User, Wallet},
};
use parking_lot::Mutex;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB,
};
use std::sync::Arc;
use uuid::Uuid;

const CF_USERS: &str = "users";
const CF_WALLETS: &str = "wallets";
const CF_TXNS: &str = "transactions";
const CF_INDICES: &str = "indices";

const IDX_EMAIL: &[u8] = b"email|";
const IDX_USER_WALLET: &[u8] = b"uw|";
const IDX_REFERENCE: &[u8] = b"ref|";
const IDX_USER_TXN: &[u8] = b"ut|";

/// Persistent store for users, wallets, and the transaction journal
pub struct Store {
    db: Arc<DB>,

    /// Serializes check-then-insert sequences for unique keys
    /// (email, transaction reference)
    unique_guard: Mutex<()>,
}

impl Store {
    /// Open or create the database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_USERS, Options::default()),
            ColumnFamilyDescriptor::new(CF_WALLETS, Options::default()),
            ColumnFamilyDescriptor::new(CF_TXNS, Self::cf_options_txns()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = %path.display(), "Opened wallet store");

        Ok(Self {
            db: Arc::new(db),
            unique_guard: Mutex::new(()),
        })
    }

    fn cf_options_txns() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    // `multi-threaded-cf` switches `DB` to `DBWithThreadMode<MultiThreaded>`,
    // whose handles come back as `Arc<BoundColumnFamily>`.
    fn cf_handle(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Index key helpers

    fn key_email(email: &str) -> Vec<u8> {
        let mut key = IDX_EMAIL.to_vec();
        key.extend_from_slice(email.to_ascii_lowercase().as_bytes());
        key
    }

    fn key_user_wallet(user_id: Uuid) -> Vec<u8> {
        let mut key = IDX_USER_WALLET.to_vec();
        key.extend_from_slice(user_id.as_bytes());
        key
    }

    fn key_reference(reference: &str) -> Vec<u8> {
        let mut key = IDX_REFERENCE.to_vec();
        key.extend_from_slice(reference.as_bytes());
        key
    }

    fn key_user_txn(user_id: Uuid, txn_id: Option<Uuid>) -> Vec<u8> {
        let mut key = IDX_USER_TXN.to_vec();
        key.extend_from_slice(user_id.as_bytes());
        if let Some(id) = txn_id {
            key.extend_from_slice(id.as_bytes());
        }
        key
    }

    // User and wallet operations

    /// Register a new user: builds the user and their wallet and persists
    /// both atomically. The credential hash arrives pre-hashed from the
    /// auth layer.
    pub fn register(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<(User, Wallet)> {
        let now = chrono::Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
        };
        let wallet = Wallet {
            id: Uuid::new_v4(),
            user_id: user.id,
            balance: rust_decimal::Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        self.create_user(&user, &wallet)?;
        Ok((user, wallet))
    }

    /// Create a user together with their wallet, atomically.
    ///
    /// Fails `Duplicate` if the email is already registered. The wallet is
    /// created here and nowhere else: a user without a wallet cannot exist.
    pub fn create_user(&self, user: &User, wallet: &Wallet) -> Result<()> {
        if wallet.user_id != user.id {
            return Err(Error::Storage("Wallet owner mismatch".to_string()));
        }

        let cf_users = self.cf_handle(CF_USERS)?;
        let cf_wallets = self.cf_handle(CF_WALLETS)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let email_key = Self::key_email(&user.email);

        let _guard = self.unique_guard.lock();

        if self.db.get_cf(&cf_indices, &email_key)?.is_some() {
            return Err(Error::Duplicate(format!(
                "Email already registered: {}",
                user.email
            )));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_users, user.id.as_bytes(), bincode::serialize(user)?);
        batch.put_cf(&cf_wallets, wallet.id.as_bytes(), bincode::serialize(wallet)?);
        batch.put_cf(&cf_indices, &email_key, user.id.as_bytes());
        batch.put_cf(
            &cf_indices,
            Self::key_user_wallet(user.id),
            wallet.id.as_bytes(),
        );
        self.db.write(batch)?;

        tracing::info!(user_id = %user.id, wallet_id = %wallet.id, "User registered");

        Ok(())
    }

    /// Get user by ID
    pub fn user_by_id(&self, user_id: Uuid) -> Result<User> {
        let cf = self.cf_handle(CF_USERS)?;
        let value = self
            .db
            .get_cf(&cf, user_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("User {}", user_id)))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Get user by email (case-insensitive)
    pub fn user_by_email(&self, email: &str) -> Result<User> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let value = self
            .db
            .get_cf(&cf_indices, Self::key_email(email))?
            .ok_or_else(|| Error::NotFound(format!("User with email {}", email)))?;
        let user_id = Self::uuid_from_bytes(&value)?;
        self.user_by_id(user_id)
    }

    /// Get wallet by ID
    pub fn wallet_by_id(&self, wallet_id: Uuid) -> Result<Wallet> {
        let cf = self.cf_handle(CF_WALLETS)?;
        let value = self
            .db
            .get_cf(&cf, wallet_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("Wallet {}", wallet_id)))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Get the wallet owned by a user
    pub fn wallet_by_user(&self, user_id: Uuid) -> Result<Wallet> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let value = self
            .db
            .get_cf(&cf_indices, Self::key_user_wallet(user_id))?
            .ok_or_else(|| Error::NotFound(format!("Wallet for user {}", user_id)))?;
        let wallet_id = Self::uuid_from_bytes(&value)?;
        self.wallet_by_id(wallet_id)
    }

    // Journal operations

    /// Get a transaction by its unique reference
    pub fn transaction_by_reference(&self, reference: &str) -> Result<Transaction> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let value = self
            .db
            .get_cf(&cf_indices, Self::key_reference(reference))?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", reference)))?;
        let txn_id = Self::uuid_from_bytes(&value)?;
        self.transaction_by_id(txn_id)
    }

    /// Get a transaction by record ID
    pub fn transaction_by_id(&self, txn_id: Uuid) -> Result<Transaction> {
        let cf = self.cf_handle(CF_TXNS)?;
        let value = self
            .db
            .get_cf(&cf, txn_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", txn_id)))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Insert a new transaction and write the given wallet states, all in
    /// one atomic batch.
    ///
    /// This is the commit point for every balance-mutating operation:
    /// transfer passes both wallets, withdraw passes the debited wallet,
    /// fund passes no wallet (the credit happens at reconciliation).
    /// Fails `Duplicate` if the reference already exists.
    pub fn insert_transaction(&self, txn: &Transaction, wallets: &[&Wallet]) -> Result<()> {
        let cf_txns = self.cf_handle(CF_TXNS)?;
        let cf_wallets = self.cf_handle(CF_WALLETS)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let ref_key = Self::key_reference(&txn.reference);

        let _guard = self.unique_guard.lock();

        if self.db.get_cf(&cf_indices, &ref_key)?.is_some() {
            return Err(Error::Duplicate(format!(
                "Transaction reference already exists: {}",
                txn.reference
            )));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_txns, txn.id.as_bytes(), bincode::serialize(txn)?);
        batch.put_cf(&cf_indices, &ref_key, txn.id.as_bytes());

        for party in [txn.sender, txn.receiver].into_iter().flatten() {
            batch.put_cf(&cf_indices, Self::key_user_txn(party, Some(txn.id)), []);
        }

        for wallet in wallets {
            batch.put_cf(
                &cf_wallets,
                wallet.id.as_bytes(),
                bincode::serialize(*wallet)?,
            );
        }

        self.db.write(batch)?;

        tracing::debug!(
            reference = %txn.reference,
            kind = %txn.kind,
            status = %txn.status,
            "Transaction recorded"
        );

        Ok(())
    }

    /// Rewrite an existing transaction (status flip) and, optionally, a
    /// wallet state in the same atomic batch.
    ///
    /// Used by the reconciler (credit + `Pending -> Success`) and by
    /// withdraw compensation (refund + `Pending -> Failed`).
    pub fn update_transaction(&self, txn: &Transaction, wallet: Option<&Wallet>) -> Result<()> {
        let cf_txns = self.cf_handle(CF_TXNS)?;
        let cf_wallets = self.cf_handle(CF_WALLETS)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_txns, txn.id.as_bytes(), bincode::serialize(txn)?);
        if let Some(wallet) = wallet {
            batch.put_cf(&cf_wallets, wallet.id.as_bytes(), bincode::serialize(wallet)?);
        }
        self.db.write(batch)?;

        tracing::debug!(
            reference = %txn.reference,
            status = %txn.status,
            "Transaction updated"
        );

        Ok(())
    }

    /// All transactions involving a user, newest first
    pub fn transactions_for_user(&self, user_id: Uuid) -> Result<Vec<Transaction>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let prefix = Self::key_user_txn(user_id, None);
        let iter = self.db.iterator_cf(
            &cf_indices,
            IteratorMode::From(&prefix, Direction::Forward),
        );

        let mut txns = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let txn_id = Self::uuid_from_bytes(&key[prefix.len()..])?;
            txns.push(self.transaction_by_id(txn_id)?);
        }

        // Index keys are UUIDv7-ordered, oldest first
        txns.reverse();
        Ok(txns)
    }

    /// A page of a user's journal, optionally filtered by kind
    pub fn transactions_page(
        &self,
        user_id: Uuid,
        page: usize,
        page_size: usize,
        kind: Option<TransactionKind>,
    ) -> Result<TransactionPage> {
        let page = page.max(1);
        let page_size = page_size.max(1);

        let mut txns = self.transactions_for_user(user_id)?;
        if let Some(kind) = kind {
            txns.retain(|t| t.kind == kind);
        }

        let total = txns.len();
        let total_pages = total.div_ceil(page_size);
        let items = txns
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .collect();

        Ok(TransactionPage {
            items,
            total,
            page,
            total_pages,
        })
    }

    fn uuid_from_bytes(bytes: &[u8]) -> Result<Uuid> {
        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|_| Error::Storage("Malformed UUID key".to_string()))?;
        Ok(Uuid::from_bytes(arr))
    }
}
