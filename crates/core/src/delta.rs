//! Change propagation.
//!
//! A successful dispatch produces a [`DeltaSet`]: an ordered list of
//! [`ChangeRecord`]s, each tagged with the [`Audience`] allowed to see it.
//! Recipients get an order-preserving subsequence and apply it, in order, to
//! their [`Replica`].

use crate::element::{DecodeError, Element, ElementCodec};
use crate::goods::{self, Goods};
use crate::id::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Nature of one change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    /// A new object appears, described by its full snapshot.
    Add {
        /// Snapshot of the created object.
        snapshot: Element,
    },
    /// The object disappears.
    Remove,
    /// One attribute of an existing object changes.
    UpdateAttribute {
        /// Attribute name.
        name: String,
        /// New value.
        value: String,
    },
    /// The whole object is replaced (or first revealed) by a snapshot.
    ReplaceSubtree {
        /// New snapshot.
        snapshot: Element,
    },
    /// Goods move into the target, out of `from` when the recipient knows it.
    TransferGoods {
        /// Source of the goods; need not exist anymore.
        from: ObjectId,
        /// Goods moved.
        goods: Vec<Goods>,
    },
}

/// One change applied to one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Affected object.
    pub target: ObjectId,
    /// What happened to it.
    pub change: Change,
}

impl ChangeRecord {
    /// `target` was created.
    pub fn add(target: ObjectId, snapshot: Element) -> Self {
        Self {
            target,
            change: Change::Add { snapshot },
        }
    }

    /// `target` was removed.
    pub fn remove(target: ObjectId) -> Self {
        Self {
            target,
            change: Change::Remove,
        }
    }

    /// `target.name` is now `value`.
    pub fn update(target: ObjectId, name: &str, value: impl ToString) -> Self {
        Self {
            target,
            change: Change::UpdateAttribute {
                name: name.to_string(),
                value: value.to_string(),
            },
        }
    }

    /// `target` is now `snapshot`.
    pub fn replace(target: ObjectId, snapshot: Element) -> Self {
        Self {
            target,
            change: Change::ReplaceSubtree { snapshot },
        }
    }

    /// `goods` moved from `from` to `target`.
    pub fn transfer(target: ObjectId, from: ObjectId, goods: Vec<Goods>) -> Self {
        Self {
            target,
            change: Change::TransferGoods { from, goods },
        }
    }

    /// Every identifier the record mentions, target first.
    pub fn references(&self) -> Vec<&ObjectId> {
        match &self.change {
            Change::TransferGoods { from, .. } => vec![&self.target, from],
            _ => vec![&self.target],
        }
    }

    /// Element form: `<add>`, `<remove>`, `<set>`, `<replace>` or `<transfer>`.
    pub fn to_element(&self) -> Element {
        let base = |tag: &str| Element::new(tag).with_attr("id", &self.target);
        match &self.change {
            Change::Add { snapshot } => base("add").with_child(snapshot.clone()),
            Change::Remove => base("remove"),
            Change::UpdateAttribute { name, value } => base("set")
                .with_attr("name", name)
                .with_attr("value", value),
            Change::ReplaceSubtree { snapshot } => base("replace").with_child(snapshot.clone()),
            Change::TransferGoods { from, goods } => base("transfer")
                .with_attr("from", from)
                .with_children(goods.iter().map(Goods::to_element)),
        }
    }

    /// Decode any of the record tags.
    pub fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let target = element.id_attr("id")?;
        let snapshot = || {
            element
                .children()
                .first()
                .cloned()
                .ok_or_else(|| DecodeError::MissingChild {
                    tag: element.tag().to_string(),
                    index: 0,
                })
        };
        let change = match element.tag() {
            "add" => Change::Add {
                snapshot: snapshot()?,
            },
            "remove" => Change::Remove,
            "set" => Change::UpdateAttribute {
                name: element.required_attr("name")?.to_string(),
                value: element.required_attr("value")?.to_string(),
            },
            "replace" => Change::ReplaceSubtree {
                snapshot: snapshot()?,
            },
            "transfer" => Change::TransferGoods {
                from: element.id_attr("from")?,
                goods: element.children_as()?,
            },
            other => {
                return Err(DecodeError::UnexpectedTag {
                    expected: "add|remove|set|replace|transfer".to_string(),
                    found: other.to_string(),
                })
            }
        };
        Ok(Self { target, change })
    }
}

/// Who may see a change record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Audience {
    /// Every connected player.
    All,
    /// Only this player.
    Only(ObjectId),
    /// Everyone but this player.
    AllExcept(ObjectId),
    /// Exactly these players.
    Players(BTreeSet<ObjectId>),
}

impl Audience {
    /// Audience of the given players.
    pub fn players<I: IntoIterator<Item = ObjectId>>(players: I) -> Self {
        Audience::Players(players.into_iter().collect())
    }

    /// Whether `player` may see records with this audience.
    pub fn admits(&self, player: &ObjectId) -> bool {
        match self {
            Audience::All => true,
            Audience::Only(only) => only == player,
            Audience::AllExcept(excluded) => excluded != player,
            Audience::Players(players) => players.contains(player),
        }
    }
}

/// Ordered change records produced by one successful dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaSet {
    entries: Vec<(Audience, ChangeRecord)>,
}

impl DeltaSet {
    /// Empty delta set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record visible to `audience`.
    pub fn push(&mut self, audience: Audience, record: ChangeRecord) {
        self.entries.push((audience, record));
    }

    /// Append a record visible to everyone.
    pub fn push_public(&mut self, record: ChangeRecord) {
        self.push(Audience::All, record);
    }

    /// Append every entry of `other`, keeping its order.
    pub fn extend(&mut self, other: DeltaSet) {
        self.entries.extend(other.entries);
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no record was produced.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in production order.
    pub fn entries(&self) -> &[(Audience, ChangeRecord)] {
        &self.entries
    }

    /// All records in production order, ignoring audiences.
    pub fn records(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.entries.iter().map(|(_, record)| record)
    }

    /// The subsequence `player` may see, in production order.
    pub fn visible_to(&self, player: &ObjectId) -> Vec<ChangeRecord> {
        self.entries
            .iter()
            .filter(|(audience, _)| audience.admits(player))
            .map(|(_, record)| record.clone())
            .collect()
    }
}

/// Failure to apply a change record to a [`Replica`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// The record needs an object the replica does not hold.
    #[error("change targets unknown object {0}")]
    Missing(ObjectId),
    /// An add names an object the replica already holds.
    #[error("object {0} already exists")]
    AlreadyPresent(ObjectId),
    /// A transfer would overflow the receiver's goods.
    #[error("goods held by {0} would overflow")]
    Overflow(ObjectId),
    /// Held goods could not be read back.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// A participant's partial copy of the world, keyed by identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replica {
    objects: BTreeMap<ObjectId, Element>,
}

impl Replica {
    /// Empty replica.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly, e.g. from an initial snapshot.
    pub fn insert(&mut self, id: ObjectId, snapshot: Element) {
        self.objects.insert(id, snapshot);
    }

    /// Snapshot held for `id`.
    pub fn get(&self, id: &ObjectId) -> Option<&Element> {
        self.objects.get(id)
    }

    /// Number of objects held.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Apply one record.
    ///
    /// On error the replica is unchanged.
    pub fn apply(&mut self, record: &ChangeRecord) -> Result<(), ApplyError> {
        let target = &record.target;
        match &record.change {
            Change::Add { snapshot } => {
                if self.objects.contains_key(target) {
                    return Err(ApplyError::AlreadyPresent(target.clone()));
                }
                self.objects.insert(target.clone(), snapshot.clone());
            }
            Change::Remove => {
                self.objects
                    .remove(target)
                    .ok_or_else(|| ApplyError::Missing(target.clone()))?;
            }
            Change::UpdateAttribute { name, value } => {
                self.objects
                    .get_mut(target)
                    .ok_or_else(|| ApplyError::Missing(target.clone()))?
                    .set_attr(name, value);
            }
            Change::ReplaceSubtree { snapshot } => {
                self.objects.insert(target.clone(), snapshot.clone());
            }
            Change::TransferGoods { from, goods } => {
                let receiver = self
                    .objects
                    .get(target)
                    .ok_or_else(|| ApplyError::Missing(target.clone()))?;
                let mut received = held_goods(receiver)?;
                let mut source = match self.objects.get(from) {
                    Some(element) => Some(held_goods(element)?),
                    None => None,
                };
                for item in goods {
                    if !goods::merge_into(&mut received, item) {
                        return Err(ApplyError::Overflow(target.clone()));
                    }
                    if let Some(cargo) = source.as_mut() {
                        goods::take_from(cargo, item);
                    }
                }
                if let Some(receiver) = self.objects.get_mut(target) {
                    replace_goods(receiver, &received);
                }
                if let (Some(cargo), Some(element)) = (source, self.objects.get_mut(from)) {
                    replace_goods(element, &cargo);
                }
            }
        }
        Ok(())
    }

    /// Apply records in order, stopping at the first failure.
    pub fn apply_all<'a, I>(&mut self, records: I) -> Result<(), ApplyError>
    where
        I: IntoIterator<Item = &'a ChangeRecord>,
    {
        records
            .into_iter()
            .try_for_each(|record| self.apply(record))
    }
}

fn held_goods(element: &Element) -> Result<Vec<Goods>, DecodeError> {
    element
        .children()
        .iter()
        .filter(|child| child.tag() == Goods::TAG)
        .map(Goods::from_element)
        .collect()
}

fn replace_goods(element: &mut Element, cargo: &[Goods]) {
    let children = element.children_mut();
    children.retain(|child| child.tag() != Goods::TAG);
    children.extend(cargo.iter().map(Goods::to_element));
}
