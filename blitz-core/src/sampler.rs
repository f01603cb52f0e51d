//! Randomized sampling of game words from the corpus.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;
use rand::seq::SliceRandom;
use rand::{Rng, rng};
use serde_json::json;
use tracing::warn;

use blitz_store::{Collection, Filter, ReadOptions, RecordStore, decode_rows};
use blitz_types::GameWord;

pub struct WordSampler {
    store: Arc<dyn RecordStore>,
    max_parallel: usize,
}

impl WordSampler {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            max_parallel: 4,
        }
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// A word is in play when its disabled flag is absent or false.
    fn enabled_words(language: &str) -> Filter {
        Filter::And(vec![
            Filter::Eq("language", json!(language)),
            Filter::Or(vec![
                Filter::Missing("is_disabled"),
                Filter::Eq("is_disabled", json!(false)),
            ]),
        ])
    }

    /// Draw up to `count` distinct words for a language.
    ///
    /// True uniform sampling over a large table is expensive, so the
    /// sampler randomizes the window instead: a few contiguous range
    /// reads at random offsets, issued concurrently, merged, shuffled
    /// and truncated. More windows are used when the corpus is small
    /// relative to the request; never more than the configured cap.
    ///
    /// An empty corpus or a failed count is a soft "no content" result,
    /// and a failed range read simply contributes no rows.
    pub async fn sample(&self, language: &str, count: usize) -> Vec<GameWord> {
        if count == 0 {
            return Vec::new();
        }

        let filter = Self::enabled_words(language);
        let total = match self.store.count(Collection::Words, &filter).await {
            Ok(total) => total as usize,
            Err(err) => {
                warn!("Word count for language {language} failed: {err}");
                return Vec::new();
            }
        };
        if total == 0 {
            warn!("No words found for language {language}");
            return Vec::new();
        }

        let fetches = total.div_ceil(count).min(self.max_parallel);
        let max_offset = total.saturating_sub(count);
        let offsets: Vec<usize> = {
            let mut rng = rng();
            (0..fetches)
                .map(|_| {
                    if max_offset == 0 {
                        0
                    } else {
                        rng.random_range(0..max_offset)
                    }
                })
                .collect()
        };

        let reads = offsets.into_iter().map(|offset| {
            let store = self.store.clone();
            let filter = filter.clone();
            let options = ReadOptions::new().offset(offset).limit(count);
            async move { store.read_many(Collection::Words, &filter, &options).await }
        });
        let results = join_all(reads).await;

        let mut seen = HashSet::new();
        let mut words: Vec<GameWord> = Vec::new();
        for result in results {
            let rows = match result {
                Ok(rows) => rows,
                Err(err) => {
                    warn!("Word range read failed: {err}");
                    continue;
                }
            };
            let batch: Vec<GameWord> = match decode_rows(rows) {
                Ok(batch) => batch,
                Err(err) => {
                    warn!("Word rows failed to decode: {err}");
                    continue;
                }
            };
            for word in batch {
                // first occurrence wins
                if seen.insert(word.id) {
                    words.push(word);
                }
            }
        }

        let mut rng = rng();
        words.shuffle(&mut rng);
        words.truncate(count);
        words
    }
}
