//! Reconciling freshly collected records with the stored corpus.
//!
//! Records are keyed by URL. The existing corpus seeds the map and the
//! incoming batch is applied on top of it, so the newest write for a URL wins.
//! Each record is normalized on the way in ([`ArticleRecord::normalized`]),
//! which keeps `has_image` consistent with `image_url` no matter what the
//! stored file said.
//!
//! Output order is not part of the contract. Records are emitted newest date
//! first, then by URL, so that rewriting an unchanged corpus produces an
//! identical file.

use itertools::Itertools;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::{debug, info};

use crate::models::ArticleRecord;

/// Merge `incoming` into `existing`, last write wins per URL.
pub fn merge(existing: Vec<ArticleRecord>, incoming: Vec<ArticleRecord>) -> Vec<ArticleRecord> {
    let mut by_url: HashMap<String, ArticleRecord> =
        HashMap::with_capacity(existing.len() + incoming.len());
    for record in existing {
        let record = record.normalized();
        by_url.insert(record.url.clone(), record);
    }

    let (mut added, mut replaced) = (0usize, 0usize);
    for record in incoming {
        let record = record.normalized();
        match by_url.entry(record.url.clone()) {
            Entry::Occupied(mut slot) => {
                debug!(url = %record.url, "Replacing stored record");
                slot.insert(record);
                replaced += 1;
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
                added += 1;
            }
        }
    }

    info!(total = by_url.len(), added, replaced, "Merged records");
    by_url
        .into_values()
        .sorted_by(|a, b| {
            b.create_time
                .cmp(&a.create_time)
                .then_with(|| a.url.cmp(&b.url))
        })
        .collect()
}
