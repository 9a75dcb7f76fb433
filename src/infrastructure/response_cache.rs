//! 响应缓存 - 基础设施层
//!
//! 按条目 TTL + LRU 淘汰的键值缓存，用于避免重复发起参数完全相同的
//! 生成调用。过期是惰性的：任何读写先丢弃已过期条目。
//!
//! 并发语义：同一个 key 的并发 `set` 是后写覆盖，没有顺序保证。
//! 对这里缓存的幂等生成调用无妨，挪作他用前要先想清楚这条竞态。

use std::sync::Mutex;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::debug;

use crate::config::Config;
use crate::models::Fact;

/// 缓存键的十六进制摘要长度（截断以控制内存）
const KEY_DIGEST_LEN: usize = 16;

/// 由调用参数生成稳定缓存键
///
/// 参数序列化为键排序后的 JSON，再取 SHA-256 摘要的前
/// [`KEY_DIGEST_LEN`] 个十六进制字符。
pub fn make_cache_key(params: &serde_json::Value) -> String {
    let canonical = canonicalize(params).to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..KEY_DIGEST_LEN].to_string()
}

/// 递归地把 JSON 对象的键排序，保证序列化结果稳定
fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<(&String, &serde_json::Value)> = map.iter().collect();
            entries.sort_by_key(|(k, _)| k.as_str());
            let mut out = serde_json::Map::new();
            for (k, v) in entries {
                out.insert(k.clone(), canonicalize(v));
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

struct CacheEntry<V> {
    key: String,
    value: V,
    created_at: Instant,
    ttl: Duration,
    hit_count: u64,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) <= self.ttl
    }
}

/// 累计命中统计
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl CacheStats {
    /// 命中率 [0, 1]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheInner<V> {
    /// 插入序存储，队尾是最近使用端
    entries: Vec<CacheEntry<V>>,
    stats: CacheStats,
}

/// 响应缓存
///
/// 每类内容一个具名实例（过期容忍度因内容而异），见 [`CacheRegistry`]。
pub struct ResponseCache<V: Clone> {
    name: String,
    max_size: usize,
    default_ttl: Duration,
    inner: Mutex<CacheInner<V>>,
    /// 淘汰回调（被淘汰条目的 key）
    eviction_callback: Option<Box<dyn Fn(&str) + Send + Sync>>,
}

impl<V: Clone> ResponseCache<V> {
    /// 创建新的缓存实例
    pub fn new(name: impl Into<String>, max_size: usize, default_ttl: Duration) -> Self {
        Self {
            name: name.into(),
            max_size: max_size.max(1),
            default_ttl,
            inner: Mutex::new(CacheInner {
                entries: Vec::new(),
                stats: CacheStats::default(),
            }),
            eviction_callback: None,
        }
    }

    /// 设置淘汰回调
    pub fn with_eviction_callback(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.eviction_callback = Some(Box::new(callback));
        self
    }

    /// 读取条目；命中时移到最近使用端并累加命中计数
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock().expect("缓存锁中毒");
        self.drop_expired(&mut inner);

        match inner.entries.iter().position(|e| e.key == key) {
            Some(idx) => {
                let mut entry = inner.entries.remove(idx);
                entry.hit_count += 1;
                let value = entry.value.clone();
                inner.entries.push(entry);
                inner.stats.hits += 1;
                debug!("💾 缓存 [{}] 命中: {}", self.name, key);
                Some(value)
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    /// 写入条目；容量满时先淘汰最久未使用的条目
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let mut inner = self.inner.lock().expect("缓存锁中毒");
        self.drop_expired(&mut inner);

        // 同 key 覆盖写，条目移到最近使用端
        if let Some(idx) = inner.entries.iter().position(|e| e.key == key) {
            inner.entries.remove(idx);
        } else if inner.entries.len() >= self.max_size {
            let evicted = inner.entries.remove(0);
            inner.stats.evictions += 1;
            debug!("💾 缓存 [{}] 淘汰最久未使用条目: {}", self.name, evicted.key);
            if let Some(cb) = &self.eviction_callback {
                cb(&evicted.key);
            }
        }

        inner.entries.push(CacheEntry {
            key,
            value,
            created_at: Instant::now(),
            ttl: ttl.unwrap_or(self.default_ttl),
            hit_count: 0,
        });
    }

    /// 条目是否存在且未过期（不改变 LRU 顺序，不计入命中统计）
    pub fn has(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().expect("缓存锁中毒");
        self.drop_expired(&mut inner);
        inner.entries.iter().any(|e| e.key == key)
    }

    /// 删除条目
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().expect("缓存锁中毒");
        match inner.entries.iter().position(|e| e.key == key) {
            Some(idx) => {
                inner.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    /// 主动清理过期条目，返回清理数量
    pub fn cleanup(&self) -> usize {
        let mut inner = self.inner.lock().expect("缓存锁中毒");
        let before = inner.entries.len();
        self.drop_expired(&mut inner);
        before - inner.entries.len()
    }

    /// 当前条目数
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().expect("缓存锁中毒");
        inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 累计统计快照
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().expect("缓存锁中毒");
        inner.stats
    }

    fn drop_expired(&self, inner: &mut CacheInner<V>) {
        let now = Instant::now();
        let before = inner.entries.len();
        inner.entries.retain(|e| e.is_live(now));
        inner.stats.expirations += (before - inner.entries.len()) as u64;
    }
}

/// 缓存注册表
///
/// 进程启动时构造一次，按引用传递。分类结果和抽取事实的
/// 过期容忍度不同，各用一个实例。
pub struct CacheRegistry {
    /// 分类类结果（行政分类、语义裁决），TTL 数天
    pub classification: ResponseCache<String>,
    /// 抽取出的事实列表，TTL 一天
    pub facts: ResponseCache<Vec<Fact>>,
}

impl CacheRegistry {
    /// 根据配置构造注册表
    pub fn new(config: &Config) -> Self {
        Self {
            classification: ResponseCache::new(
                "classification",
                config.classification_cache_max_size,
                Duration::from_secs(config.classification_cache_ttl_secs),
            ),
            facts: ResponseCache::new(
                "facts",
                config.fact_cache_max_size,
                Duration::from_secs(config.fact_cache_ttl_secs),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cache() -> ResponseCache<String> {
        ResponseCache::new("test", 3, Duration::from_secs(60))
    }

    #[test]
    fn test_make_cache_key_order_independent() {
        let a = serde_json::json!({"model": "m1", "prompt": "p", "temperature": 0.3});
        let b = serde_json::json!({"temperature": 0.3, "prompt": "p", "model": "m1"});
        assert_eq!(make_cache_key(&a), make_cache_key(&b));
        assert_eq!(make_cache_key(&a).len(), KEY_DIGEST_LEN);
    }

    #[test]
    fn test_make_cache_key_distinguishes_params() {
        let a = serde_json::json!({"prompt": "p1"});
        let b = serde_json::json!({"prompt": "p2"});
        assert_ne!(make_cache_key(&a), make_cache_key(&b));
    }

    #[tokio::test]
    async fn test_lru_evicts_oldest_without_reads() {
        let cache = small_cache();
        cache.set("k1", "v1".to_string(), None);
        cache.set("k2", "v2".to_string(), None);
        cache.set("k3", "v3".to_string(), None);
        // 插入第 max_size+1 个 key，最早的 k1 被淘汰
        cache.set("k4", "v4".to_string(), None);

        assert_eq!(cache.get("k1"), None);
        assert_eq!(cache.get("k4"), Some("v4".to_string()));
    }

    #[tokio::test]
    async fn test_lru_read_protects_entry() {
        let cache = small_cache();
        cache.set("k1", "v1".to_string(), None);
        cache.set("k2", "v2".to_string(), None);
        cache.set("k3", "v3".to_string(), None);

        // 读 k1 把它移到最近使用端，随后的淘汰应落在 k2 上
        assert_eq!(cache.get("k1"), Some("v1".to_string()));
        cache.set("k4", "v4".to_string(), None);

        assert_eq!(cache.get("k1"), Some("v1".to_string()));
        assert!(!cache.has("k2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_lazy_expiry() {
        let cache = ResponseCache::new("ttl-test", 10, Duration::from_secs(5));
        cache.set("k1", "v1".to_string(), None);
        cache.set("k2", "v2".to_string(), Some(Duration::from_secs(100)));

        tokio::time::advance(Duration::from_secs(6)).await;

        // k1 过期，k2 的自定义 TTL 尚未到
        assert_eq!(cache.get("k1"), None);
        assert_eq!(cache.get("k2"), Some("v2".to_string()));
        assert_eq!(cache.stats().expirations, 1);
    }

    #[tokio::test]
    async fn test_hit_miss_counters() {
        let cache = small_cache();
        cache.set("k1", "v1".to_string(), None);

        let _ = cache.get("k1");
        let _ = cache.get("k1");
        let _ = cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_eviction_callback_fires() {
        use std::sync::{Arc, Mutex};
        let evicted: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let evicted_clone = evicted.clone();

        let cache = ResponseCache::new("cb-test", 1, Duration::from_secs(60))
            .with_eviction_callback(move |key| {
                evicted_clone.lock().unwrap().push(key.to_string());
            });

        cache.set("k1", "v1".to_string(), None);
        cache.set("k2", "v2".to_string(), None);

        assert_eq!(evicted.lock().unwrap().as_slice(), &["k1".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_and_cleanup() {
        let cache = small_cache();
        cache.set("k1", "v1".to_string(), None);
        assert!(cache.delete("k1"));
        assert!(!cache.delete("k1"));
        assert!(cache.is_empty());
        assert_eq!(cache.cleanup(), 0);
    }
}
