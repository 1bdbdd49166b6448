//! §8 scenario 6: a log filter's successive `get_filter_changes` windows
//! tile the requested range exactly once each as the chain head advances,
//! with no block queried twice and none skipped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethereum_types::{Address, H256, U256};
use relay_core::cache::CacheService;
use relay_core::errors::RpcErr;
use relay_core::filter::{FilterChainReader, FilterChanges, FilterService, LogFilterParams};
use relay_core::types::RpcLog;

struct AdvancingReader {
    head: AtomicU64,
    logs: Vec<RpcLog>,
}

#[async_trait]
impl FilterChainReader for AdvancingReader {
    async fn current_head(&self) -> Result<u64, RpcErr> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn get_logs(&self, from_block: u64, to_block: u64, _address: Option<Address>, _topics: &[H256]) -> Result<Vec<RpcLog>, RpcErr> {
        Ok(self
            .logs
            .iter()
            .filter(|log| {
                let n = log.block_number.as_u64();
                n >= from_block && n <= to_block
            })
            .cloned()
            .collect())
    }

    async fn get_block_hashes_since(&self, _from_block_exclusive: u64) -> Result<Vec<(u64, H256)>, RpcErr> {
        unreachable!("this scenario only exercises log filters")
    }
}

fn sample_log(block_number: u64) -> RpcLog {
    RpcLog {
        address: Address::zero(),
        topics: vec![],
        data: "0x".to_string(),
        block_hash: H256::zero(),
        block_number: U256::from(block_number),
        transaction_hash: H256::zero(),
        transaction_index: U256::zero(),
        log_index: U256::zero(),
        removed: false,
    }
}

#[tokio::test]
async fn successive_windows_never_repeat_or_skip_a_log() {
    let reader = Arc::new(AdvancingReader {
        head: AtomicU64::new(100),
        logs: vec![sample_log(110), sample_log(140), sample_log(160), sample_log(190), sample_log(200)],
    });
    let cache = Arc::new(CacheService::new(Duration::from_secs(300), None));
    let service = FilterService::new(cache, reader.clone(), true);

    let filter_id = service
        .new_filter(LogFilterParams { from_block: 100, to_block: 200, address: None, topics: vec![] })
        .await
        .unwrap();

    reader.head.store(150, Ordering::SeqCst);
    let FilterChanges::Logs(first) = service.get_filter_changes(&filter_id).await.unwrap() else {
        panic!("expected logs")
    };
    let first_blocks: Vec<u64> = first.iter().map(|log| log.block_number.as_u64()).collect();
    assert_eq!(first_blocks, vec![110, 140]);

    reader.head.store(175, Ordering::SeqCst);
    let FilterChanges::Logs(second) = service.get_filter_changes(&filter_id).await.unwrap() else {
        panic!("expected logs")
    };
    let second_blocks: Vec<u64> = second.iter().map(|log| log.block_number.as_u64()).collect();
    assert_eq!(second_blocks, vec![160]);

    reader.head.store(210, Ordering::SeqCst);
    let FilterChanges::Logs(third) = service.get_filter_changes(&filter_id).await.unwrap() else {
        panic!("expected logs")
    };
    let third_blocks: Vec<u64> = third.iter().map(|log| log.block_number.as_u64()).collect();
    assert_eq!(third_blocks, vec![190, 200]);

    let mut seen = first_blocks;
    seen.extend(second_blocks);
    seen.extend(third_blocks);
    assert_eq!(seen, vec![110, 140, 160, 190, 200], "every log appears in exactly one window, in order");
}
