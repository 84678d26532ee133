// Remote hot-tier backend over redis.
//
// The connection manager reconnects on its own; every failure is surfaced as
// KvError::Unavailable so the tier wrapper can decide whether the in-memory
// fallback applies. Atomic paths (claim slots, lock release) use SET NX and
// a compare-and-delete script; everything multi-step goes through an atomic
// pipeline.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use lazy_static::lazy_static;
use redis::{aio::ConnectionManager, AsyncCommands, Client, Script};

use super::backend::{KvBackend, KvError, KvResult};

// Release only succeeds for the token that acquired the lock
const COMPARE_AND_DELETE: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
else
    return 0
end
"#;

lazy_static! {
    static ref COMPARE_AND_DELETE_SCRIPT: Script = Script::new(COMPARE_AND_DELETE);
}

pub struct RedisBackend {
    manager: ConnectionManager,
}

impl RedisBackend {
    pub async fn connect(url: &str) -> KvResult<Self> {
        let client = Client::open(url).map_err(map_err)?;
        let manager = client.get_connection_manager().await.map_err(map_err)?;
        Ok(Self { manager })
    }

    fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

fn map_err(error: redis::RedisError) -> KvError {
    KvError::Unavailable(error.to_string())
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn ping(&self) -> KvResult<()> {
        let mut con = self.connection();
        redis::cmd("PING")
            .query_async::<()>(&mut con)
            .await
            .map_err(map_err)
    }

    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut con = self.connection();
        let value: Option<String> = con.get(key).await.map_err(map_err)?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
        let mut con = self.connection();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async::<()>(&mut con)
            .await
            .map_err(map_err)
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool> {
        let mut con = self.connection();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut con)
            .await
            .map_err(map_err)?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> KvResult<()> {
        let mut con = self.connection();
        let _: u64 = con.del(key).await.map_err(map_err)?;
        Ok(())
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> KvResult<bool> {
        let mut con = self.connection();
        let deleted: i64 = COMPARE_AND_DELETE_SCRIPT
            .key(key)
            .arg(expected)
            .invoke_async(&mut con)
            .await
            .map_err(map_err)?;
        Ok(deleted == 1)
    }

    async fn incr_ex(&self, key: &str, ttl: Duration) -> KvResult<u64> {
        let mut con = self.connection();
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .incr(key, 1u64)
            .cmd("PEXPIRE")
            .arg(key)
            .arg(ttl.as_millis() as u64)
            .ignore()
            .query_async(&mut con)
            .await
            .map_err(map_err)?;
        Ok(count)
    }

    async fn hash_incr(
        &self,
        key: &str,
        fields: &[(String, i64)],
        ttl: Option<Duration>,
    ) -> KvResult<()> {
        let mut con = self.connection();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (field, delta) in fields {
            pipe.hincr(key, field, *delta).ignore();
        }
        if let Some(ttl) = ttl {
            pipe.cmd("PEXPIRE")
                .arg(key)
                .arg(ttl.as_millis() as u64)
                .ignore();
        }
        pipe.query_async::<()>(&mut con).await.map_err(map_err)
    }

    async fn hash_set(&self, key: &str, field: &str, value: i64) -> KvResult<()> {
        let mut con = self.connection();
        let _: () = con.hset(key, field, value).await.map_err(map_err)?;
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> KvResult<HashMap<String, i64>> {
        let mut con = self.connection();
        let map: HashMap<String, i64> = con.hgetall(key).await.map_err(map_err)?;
        Ok(map)
    }

    async fn hash_get_all_many(&self, keys: &[String]) -> KvResult<Vec<HashMap<String, i64>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut con = self.connection();
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.hgetall(key);
        }
        let maps: Vec<HashMap<String, i64>> =
            pipe.query_async(&mut con).await.map_err(map_err)?;
        Ok(maps)
    }

    async fn zset_incr(&self, key: &str, member: &str, delta: u64) -> KvResult<()> {
        let mut con = self.connection();
        let _: f64 = con.zincr(key, member, delta).await.map_err(map_err)?;
        Ok(())
    }

    async fn zset_rev_rank(&self, key: &str, member: &str) -> KvResult<Option<u64>> {
        let mut con = self.connection();
        let rank: Option<u64> = con.zrevrank(key, member).await.map_err(map_err)?;
        Ok(rank)
    }

    async fn zset_score(&self, key: &str, member: &str) -> KvResult<Option<u64>> {
        let mut con = self.connection();
        let score: Option<f64> = con.zscore(key, member).await.map_err(map_err)?;
        Ok(score.map(|s| s as u64))
    }

    async fn zset_rev_range(&self, key: &str, limit: usize) -> KvResult<Vec<(String, u64)>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut con = self.connection();
        let stop = (limit - 1) as isize;
        let ranked: Vec<(String, f64)> = con
            .zrevrange_withscores(key, 0, stop)
            .await
            .map_err(map_err)?;
        Ok(ranked
            .into_iter()
            .map(|(member, score)| (member, score as u64))
            .collect())
    }

    async fn list_push_trim(
        &self,
        key: &str,
        value: &str,
        cap: usize,
        ttl: Option<Duration>,
    ) -> KvResult<()> {
        let mut con = self.connection();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .lpush(key, value)
            .ignore()
            .ltrim(key, 0, cap.saturating_sub(1) as isize)
            .ignore();
        if let Some(ttl) = ttl {
            pipe.cmd("PEXPIRE")
                .arg(key)
                .arg(ttl.as_millis() as u64)
                .ignore();
        }
        pipe.query_async::<()>(&mut con).await.map_err(map_err)
    }

    async fn list_range(&self, key: &str, limit: usize) -> KvResult<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut con = self.connection();
        let items: Vec<String> = con
            .lrange(key, 0, (limit - 1) as isize)
            .await
            .map_err(map_err)?;
        Ok(items)
    }

    async fn set_add_ex(&self, key: &str, member: &str, ttl: Duration) -> KvResult<u64> {
        let mut con = self.connection();
        let (cardinality,): (u64,) = redis::pipe()
            .atomic()
            .sadd(key, member)
            .ignore()
            .scard(key)
            .cmd("PEXPIRE")
            .arg(key)
            .arg(ttl.as_millis() as u64)
            .ignore()
            .query_async(&mut con)
            .await
            .map_err(map_err)?;
        Ok(cardinality)
    }

    async fn scan_keys(&self, pattern: &str) -> KvResult<Vec<String>> {
        let mut con = self.connection();
        let mut keys = Vec::new();
        let mut iter: redis::AsyncIter<String> =
            con.scan_match(pattern).await.map_err(map_err)?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }

    async fn rename(&self, from: &str, to: &str) -> KvResult<bool> {
        let mut con = self.connection();
        let exists: bool = con.exists(from).await.map_err(map_err)?;
        if !exists {
            return Ok(false);
        }
        let _: () = con.rename(from, to).await.map_err(map_err)?;
        Ok(true)
    }
}
