use super::{CascadeStorageError, CascadeStorageResult};
use governor::{
    clock::{QuantaClock, QuantaInstant},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{num::NonZeroU32, sync::Arc};
use tokio::sync::{OwnedSemaphorePermit, RwLock, RwLockReadGuard, RwLockWriteGuard, Semaphore};
use url::Url;

pub enum BucketLocker<'a> {
    Semaphore(OwnedSemaphorePermit),
    ReadLock(RwLockReadGuard<'a, ()>),
    WriteLock(RwLockWriteGuard<'a, ()>),
}

enum BucketLock {
    Semaphore(Arc<Semaphore>),
    RwLock(Arc<RwLock<()>>),
}

/// Throttles statement throughput and bounds concurrent writers per pool.
pub struct Bucket {
    bucket: Arc<RateLimiter<NotKeyed, InMemoryState, QuantaClock, NoOpMiddleware<QuantaInstant>>>,
    lock: BucketLock,
}

impl Bucket {
    fn new(bucket_size: u32, semaphore_size: usize) -> Self {
        let bucket_size = NonZeroU32::new(bucket_size).unwrap_or(NonZeroU32::MIN);

        Self {
            bucket: Arc::new(RateLimiter::direct(
                Quota::per_second(bucket_size).allow_burst(bucket_size),
            )),
            lock: if semaphore_size > 1 {
                BucketLock::Semaphore(Arc::new(Semaphore::new(semaphore_size)))
            } else {
                // sqlite
                BucketLock::RwLock(Arc::default())
            },
        }
    }

    async fn permit(semaphore: &Arc<Semaphore>) -> CascadeStorageResult<BucketLocker<'static>> {
        semaphore
            .clone()
            .acquire_owned()
            .await
            .map(BucketLocker::Semaphore)
            .map_err(|e| CascadeStorageError::Crud(format!("bucket closed: {e}")))
    }

    pub async fn read(&self) -> CascadeStorageResult<BucketLocker> {
        self.bucket.until_ready().await;
        match &self.lock {
            BucketLock::RwLock(lock) => Ok(BucketLocker::ReadLock(lock.read().await)),
            BucketLock::Semaphore(semaphore) => Self::permit(semaphore).await,
        }
    }

    pub async fn write(&self) -> CascadeStorageResult<BucketLocker> {
        self.bucket.until_ready().await;
        match &self.lock {
            BucketLock::RwLock(lock) => Ok(BucketLocker::WriteLock(lock.write().await)),
            BucketLock::Semaphore(semaphore) => Self::permit(semaphore).await,
        }
    }
}

#[inline]
pub fn is_sqlite(database: &str) -> bool {
    Url::parse(database)
        .map(|u| u.scheme() == "sqlite")
        .unwrap_or(false)
}

#[inline]
pub fn get_bucket(single_thread: bool) -> Arc<Bucket> {
    // sqlite only allows one writer at a time
    Arc::new(Bucket::new(
        if single_thread { 100 } else { 250 },
        if single_thread { 1 } else { 5 },
    ))
}
