use std::collections::HashMap;

use tracing::debug;

use crate::error::SyncError;
use crate::parser::industry::Industry;
use crate::parser::Entry;

/// Identity of an entry in the output tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Industry {
        industry: Industry,
        code_slug: String,
    },
    Appliance {
        appliance_type: String,
        brand: String,
        series_or_model: String,
        code_slug: String,
    },
}

impl Entry {
    pub fn key(&self) -> EntryKey {
        match &self.appliance {
            Some(h) => EntryKey::Appliance {
                appliance_type: h.appliance_type.clone(),
                brand: h.brand.clone(),
                series_or_model: h.series_or_model.clone(),
                code_slug: self.code_slug.clone(),
            },
            None => EntryKey::Industry {
                industry: self.industry,
                code_slug: self.code_slug.clone(),
            },
        }
    }
}

struct Slot {
    entry: Entry,
    bodies: Vec<String>,
}

impl Slot {
    fn new(entry: Entry) -> Self {
        let mut slot = Slot {
            bodies: Vec::new(),
            entry,
        };
        let body = std::mem::take(&mut slot.entry.body_html);
        slot.add_body(body);
        slot
    }

    /// Returns false when the body was already present.
    fn add_body(&mut self, body: String) -> bool {
        if body.is_empty() || self.bodies.contains(&body) {
            return false;
        }
        self.bodies.push(body);
        true
    }

    fn finish(mut self) -> Entry {
        self.entry.body_html = self.bodies.join("\n");
        self.entry
    }
}

/// Collapse entries sharing an identity key, in first-seen order.
///
/// The first entry's scalar fields win; distinct bodies are concatenated and a
/// missing summary is backfilled. Appliance collisions always merge. Outside
/// appliances a repeated key is only tolerated when it adds no new body
/// markup; anything else is a content collision and aborts the run.
pub fn merge_entries(entries: Vec<Entry>) -> Result<Vec<Entry>, SyncError> {
    let mut slots: Vec<Slot> = Vec::with_capacity(entries.len());
    let mut index: HashMap<EntryKey, usize> = HashMap::new();

    for entry in entries {
        let key = entry.key();
        let Some(&pos) = index.get(&key) else {
            index.insert(key, slots.len());
            slots.push(Slot::new(entry));
            continue;
        };

        let slot = &mut slots[pos];
        let added = slot.add_body(entry.body_html);
        if added && entry.appliance.is_none() {
            return Err(SyncError::DuplicateIdentity {
                industry: entry.industry.key().to_string(),
                slug: entry.code_slug,
            });
        }
        if slot.entry.summary.is_none() {
            slot.entry.summary = entry.summary;
        }
        debug!(code = %slot.entry.code, ?key, "merged repeated entry");
    }

    Ok(slots.into_iter().map(Slot::finish).collect())
}
