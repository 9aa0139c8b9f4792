//! Context association lists record.
//!
//! Two header words give the list sizes; the lists follow in order: source,
//! system, vector-component, asynchronous-channel, then the asynchronous
//! channel tags when the A bit is set.

use super::{Record, ensure_room, word};
use crate::codec::pack_u32;
use crate::config::VrtConfig;
use crate::fields::{FieldType, FieldValue, HasFields, Value, expect_value, no_such_field};
use crate::{Result, VrtError};
use serde::{Deserialize, Serialize};

const MAX_SOURCE: usize = 0x7FFF;
const MAX_SYSTEM: usize = 0x01FF;
const MAX_VECTOR: usize = 0xFFFF;
const MAX_ASYNC: usize = 0x7FFF;
const TAGS_BIT: u32 = 1 << 15;

/// Stream identifiers of the packets associated with a context stream.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContextAssocLists {
    pub source: Vec<u32>,
    pub system: Vec<u32>,
    pub vector_component: Vec<u32>,
    pub async_channel: Vec<u32>,
    /// One tag per asynchronous channel, when present.
    pub async_channel_tags: Option<Vec<u32>>,
}

struct Sizes {
    source: usize,
    system: usize,
    vector: usize,
    async_channel: usize,
    tags: bool,
}

impl Sizes {
    fn read(buf: &[u8], offset: usize) -> Result<Self> {
        let first = word(buf, offset)?;
        let second = word(buf, offset + 4)?;
        Ok(Sizes {
            source: ((first >> 16) & 0x7FFF) as usize,
            system: (first & 0x01FF) as usize,
            vector: (second >> 16) as usize,
            async_channel: (second & 0x7FFF) as usize,
            tags: second & TAGS_BIT != 0,
        })
    }

    fn entries(&self) -> usize {
        self.source + self.system + self.vector + self.async_channel * if self.tags { 2 } else { 1 }
    }
}

impl ContextAssocLists {
    /// Length of the record stored at `offset`.
    pub fn stored_length(buf: &[u8], offset: usize) -> Result<usize> {
        Ok(8 + 4 * Sizes::read(buf, offset)?.entries())
    }

    fn validate(&self) -> Result<()> {
        let check = |name: &str, len: usize, max: usize| {
            if len > max {
                Err(VrtError::invalid_argument(name, format!("{len} entries exceeds the maximum of {max}")))
            } else {
                Ok(())
            }
        };
        check("source list", self.source.len(), MAX_SOURCE)?;
        check("system list", self.system.len(), MAX_SYSTEM)?;
        check("vector-component list", self.vector_component.len(), MAX_VECTOR)?;
        check("asynchronous-channel list", self.async_channel.len(), MAX_ASYNC)?;
        if let Some(tags) = &self.async_channel_tags {
            if tags.len() != self.async_channel.len() {
                return Err(VrtError::invalid_argument(
                    "asynchronous-channel tags",
                    format!("{} tags for {} channels", tags.len(), self.async_channel.len()),
                ));
            }
        }
        Ok(())
    }

    fn lists(&self) -> [&[u32]; 5] {
        [
            &self.source,
            &self.system,
            &self.vector_component,
            &self.async_channel,
            self.async_channel_tags.as_deref().unwrap_or(&[]),
        ]
    }
}

impl Record for ContextAssocLists {
    fn byte_length(&self, _config: &VrtConfig) -> usize {
        8 + 4 * self.lists().iter().map(|list| list.len()).sum::<usize>()
    }

    fn read_from(buf: &[u8], offset: usize, _config: &VrtConfig) -> Result<Self> {
        let sizes = Sizes::read(buf, offset)?;
        ensure_room(buf, offset, 8 + 4 * sizes.entries())?;
        let mut cursor = offset + 8;
        let mut take = |count: usize| -> Result<Vec<u32>> {
            let list = (0..count).map(|i| word(buf, cursor + 4 * i)).collect::<Result<Vec<_>>>()?;
            cursor += 4 * count;
            Ok(list)
        };
        Ok(ContextAssocLists {
            source: take(sizes.source)?,
            system: take(sizes.system)?,
            vector_component: take(sizes.vector)?,
            async_channel: take(sizes.async_channel)?,
            async_channel_tags: if sizes.tags { Some(take(sizes.async_channel)?) } else { None },
        })
    }

    fn write_to(&self, buf: &mut [u8], offset: usize, config: &VrtConfig) -> Result<()> {
        self.validate()?;
        ensure_room(buf, offset, self.byte_length(config))?;
        let tags = if self.async_channel_tags.is_some() { TAGS_BIT } else { 0 };
        pack_u32(buf, offset, ((self.source.len() as u32) << 16) | self.system.len() as u32);
        pack_u32(buf, offset + 4, ((self.vector_component.len() as u32) << 16) | tags | self.async_channel.len() as u32);
        let mut cursor = offset + 8;
        for id in self.lists().into_iter().flatten() {
            pack_u32(buf, cursor, *id);
            cursor += 4;
        }
        Ok(())
    }
}

const FIELD_NAMES: [&str; 5] =
    ["SourceContext", "SystemContext", "VectorComponent", "AsynchronousChannel", "AsynchronousChannelTag"];

fn ids_to_bytes(ids: &[u32]) -> Vec<u8> {
    ids.iter().flat_map(|id| id.to_be_bytes()).collect()
}

fn bytes_to_ids(field: &str, bytes: Vec<u8>) -> Result<Vec<u32>> {
    if bytes.len() % 4 != 0 {
        return Err(VrtError::invalid_argument(field, "list bytes must be a whole number of words"));
    }
    Ok(bytes.chunks_exact(4).map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]])).collect())
}

impl HasFields for ContextAssocLists {
    fn field_count(&self) -> usize {
        FIELD_NAMES.len()
    }

    fn field_name(&self, index: usize) -> Option<&'static str> {
        FIELD_NAMES.get(index).copied()
    }

    fn field_type(&self, index: usize) -> Option<FieldType> {
        (index < FIELD_NAMES.len()).then_some(FieldType::Bytes)
    }

    fn get_field(&self, index: usize) -> Option<Value> {
        if index == 4 {
            return self.async_channel_tags.as_deref().map(|tags| ids_to_bytes(tags).into_value());
        }
        self.lists().get(index).map(|list| ids_to_bytes(list).into_value())
    }

    fn set_field(&mut self, index: usize, value: Option<Value>) -> Result<()> {
        let name = self.field_name(index).ok_or_else(|| no_such_field(index, FIELD_NAMES.len()))?;
        let ids = expect_value::<Vec<u8>>(name, value)?.map(|bytes| bytes_to_ids(name, bytes)).transpose()?;
        match index {
            0 => self.source = ids.unwrap_or_default(),
            1 => self.system = ids.unwrap_or_default(),
            2 => self.vector_component = ids.unwrap_or_default(),
            3 => self.async_channel = ids.unwrap_or_default(),
            _ => self.async_channel_tags = ids,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_follows_sizes() {
        let config = VrtConfig::default();
        let lists = ContextAssocLists {
            source: vec![1, 2],
            system: vec![3],
            vector_component: vec![],
            async_channel: vec![4, 5],
            async_channel_tags: Some(vec![6, 7]),
        };
        let bytes = lists.to_bytes(&config).unwrap();
        assert_eq!(bytes.len(), 8 + 4 * 7);
        assert_eq!(ContextAssocLists::stored_length(&bytes, 0).unwrap(), bytes.len());
        assert_eq!(ContextAssocLists::read_from(&bytes, 0, &config).unwrap(), lists);

        let untagged = ContextAssocLists { async_channel_tags: None, ..lists };
        let bytes = untagged.to_bytes(&config).unwrap();
        assert_eq!(bytes.len(), 8 + 4 * 5);
        assert_eq!(ContextAssocLists::read_from(&bytes, 0, &config).unwrap(), untagged);
    }

    #[test]
    fn tag_count_must_match_channels() {
        let lists = ContextAssocLists { async_channel: vec![1], async_channel_tags: Some(vec![]), ..Default::default() };
        assert!(lists.to_bytes(&VrtConfig::default()).is_err());
    }

    #[test]
    fn truncated_lists_are_errors() {
        let mut bytes = vec![0u8; 8];
        pack_u32(&mut bytes, 0, 3 << 16);
        assert!(ContextAssocLists::read_from(&bytes, 0, &VrtConfig::default()).is_err());
    }
}
