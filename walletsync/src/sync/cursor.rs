// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use tracing::debug;

use crate::chain::{BlockHeader, ChainAdapter};
use crate::error::{WalletError, WalletResult};

/// Advances a block-height cursor in bounded steps.
///
/// `next_headers` fetches up to `blocks_step` headers past the cursor without
/// moving it; callers commit the window with [`BatchCursor::advance`] once the
/// batch has been fully processed, so a failed cycle retries the same window.
pub struct BatchCursor {
    client: Arc<dyn ChainAdapter>,
    blocks_step: u64,
    last: BlockHeader,
}

impl BatchCursor {
    pub fn new(client: Arc<dyn ChainAdapter>, from: BlockHeader, blocks_step: u64) -> Self {
        Self {
            client,
            blocks_step: blocks_step.max(1),
            last: from,
        }
    }

    /// Height of the last committed block.
    pub fn position(&self) -> u64 {
        self.last.number
    }

    pub async fn next_headers(&mut self) -> WalletResult<Vec<BlockHeader>> {
        let head = self.client.block_header(None).await?;
        let start = self.last.number + 1;
        if head.number < start {
            debug!(head = head.number, cursor = self.last.number, "no new headers");
            return Ok(Vec::new());
        }

        let end = head.number.min(start + self.blocks_step - 1);
        let mut headers = Vec::with_capacity((end - start + 1) as usize);
        let mut prev = self.last.clone();

        for number in start..=end {
            let header = self.client.block_header(Some(number)).await?;
            // The cursor only moves along one canonical chain; a parent
            // mismatch means the fetched window straddles a reorg and the
            // whole cycle must be retried.
            if !prev.hash.is_empty() && header.parent_hash != prev.hash {
                return Err(WalletError::Transient(format!(
                    "parent hash mismatch at block {number}: expected {} got {}",
                    prev.hash, header.parent_hash
                )));
            }
            prev = header.clone();
            headers.push(header);
        }

        Ok(headers)
    }

    /// Commit the processed window; the cursor never moves backwards.
    pub fn advance(&mut self, header: BlockHeader) {
        if header.number > self.last.number {
            self.last = header;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChainAdapter;

    async fn cursor_with_chain(head: u64, step: u64) -> (Arc<MockChainAdapter>, BatchCursor) {
        let chain = Arc::new(MockChainAdapter::new());
        chain.extend_chain(head);
        let genesis = chain.block_header(Some(0)).await.unwrap();
        let cursor = BatchCursor::new(chain.clone(), genesis, step);
        (chain, cursor)
    }

    #[tokio::test]
    async fn test_bounded_window() {
        let (_chain, mut cursor) = cursor_with_chain(10, 4).await;

        let headers = cursor.next_headers().await.unwrap();
        assert_eq!(headers.len(), 4);
        assert_eq!(headers.first().unwrap().number, 1);
        assert_eq!(headers.last().unwrap().number, 4);

        // Window is not committed until advance is called.
        let retry = cursor.next_headers().await.unwrap();
        assert_eq!(retry.first().unwrap().number, 1);

        cursor.advance(headers.last().unwrap().clone());
        assert_eq!(cursor.position(), 4);

        let next = cursor.next_headers().await.unwrap();
        assert_eq!(next.first().unwrap().number, 5);
        assert_eq!(next.last().unwrap().number, 8);
    }

    #[tokio::test]
    async fn test_clamps_to_head() {
        let (_chain, mut cursor) = cursor_with_chain(2, 10).await;
        let headers = cursor.next_headers().await.unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.last().unwrap().number, 2);
    }

    #[tokio::test]
    async fn test_empty_at_head() {
        let (_chain, mut cursor) = cursor_with_chain(3, 5).await;
        let headers = cursor.next_headers().await.unwrap();
        cursor.advance(headers.last().unwrap().clone());
        assert!(cursor.next_headers().await.unwrap().is_empty());
        assert_eq!(cursor.position(), 3);
    }

    #[tokio::test]
    async fn test_cursor_never_regresses() {
        let (chain, mut cursor) = cursor_with_chain(5, 5).await;
        let headers = cursor.next_headers().await.unwrap();
        cursor.advance(headers.last().unwrap().clone());
        let position = cursor.position();

        // Advancing with an older header is a no-op.
        let old = chain.block_header(Some(1)).await.unwrap();
        cursor.advance(old);
        assert_eq!(cursor.position(), position);
    }
}
