use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// One entry of a list definition, addressed as `origin.item`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InkListItem {
    pub origin_name: Option<String>,
    pub item_name: String,
}

impl InkListItem {
    pub fn new(origin_name: impl Into<String>, item_name: impl Into<String>) -> Self {
        Self {
            origin_name: Some(origin_name.into()),
            item_name: item_name.into(),
        }
    }

    pub fn from_full_name(full_name: &str) -> Self {
        match full_name.split_once('.') {
            Some((origin, item)) => Self::new(origin, item),
            None => Self {
                origin_name: None,
                item_name: full_name.to_string(),
            },
        }
    }

    pub fn full_name(&self) -> String {
        format!(
            "{}.{}",
            self.origin_name.as_deref().unwrap_or("?"),
            self.item_name
        )
    }
}

impl fmt::Display for InkListItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// A declared list: item names and their ranks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDefinition {
    name: String,
    items_by_name: BTreeMap<String, i32>,
}

impl ListDefinition {
    pub fn new(name: impl Into<String>, items_by_name: BTreeMap<String, i32>) -> Self {
        Self {
            name: name.into(),
            items_by_name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn raw_items(&self) -> &BTreeMap<String, i32> {
        &self.items_by_name
    }

    pub fn items(&self) -> impl Iterator<Item = (InkListItem, i32)> + '_ {
        self.items_by_name
            .iter()
            .map(|(item, value)| (InkListItem::new(self.name.clone(), item.clone()), *value))
    }

    pub fn value_for_item(&self, item: &InkListItem) -> Option<i32> {
        self.items_by_name.get(&item.item_name).copied()
    }

    pub fn contains_item_named(&self, item_name: &str) -> bool {
        self.items_by_name.contains_key(item_name)
    }

    pub fn item_with_value(&self, value: i32) -> Option<InkListItem> {
        self.items_by_name
            .iter()
            .find(|(_, rank)| **rank == value)
            .map(|(item, _)| InkListItem::new(self.name.clone(), item.clone()))
    }
}

/// Every list definition of a story plus a lookup of unambiguous item names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListDefinitions {
    lists: BTreeMap<String, ListDefinition>,
    single_items: HashMap<String, (InkListItem, i32)>,
}

impl ListDefinitions {
    pub fn new(definitions: Vec<ListDefinition>) -> Self {
        let mut lists = BTreeMap::new();
        let mut single_items = HashMap::new();
        for definition in definitions {
            for (item, value) in definition.items() {
                single_items.insert(item.item_name.clone(), (item.clone(), value));
                single_items.insert(item.full_name(), (item, value));
            }
            lists.insert(definition.name.clone(), definition);
        }
        Self {
            lists,
            single_items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    pub fn lists(&self) -> impl Iterator<Item = &ListDefinition> {
        self.lists.values()
    }

    pub fn definition(&self, name: &str) -> Option<&ListDefinition> {
        self.lists.get(name)
    }

    /// Resolves `Colours.red` or a bare `red` to a one-item list.
    pub fn find_single_item_list_with_name(&self, name: &str) -> Option<InkList> {
        self.single_items
            .get(name)
            .map(|(item, value)| InkList::from_item(item.clone(), *value))
    }
}

/// A set of list items with their ranks.
///
/// Lists remember the names of the definitions they were built from so that an
/// emptied list can still answer `LIST_ALL` and `LIST_INVERT`.
#[derive(Debug, Clone, Default)]
pub struct InkList {
    items: BTreeMap<InkListItem, i32>,
    initial_origin_names: Vec<String>,
}

impl PartialEq for InkList {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len()
            && self.items.keys().all(|item| other.items.contains_key(item))
    }
}

impl Eq for InkList {}

impl InkList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_origin(origin_name: impl Into<String>) -> Self {
        Self {
            items: BTreeMap::new(),
            initial_origin_names: vec![origin_name.into()],
        }
    }

    pub fn from_item(item: InkListItem, value: i32) -> Self {
        let mut list = Self::new();
        list.insert(item, value);
        list
    }

    pub fn insert(&mut self, item: InkListItem, value: i32) {
        self.items.insert(item, value);
    }

    pub fn remove(&mut self, item: &InkListItem) -> Option<i32> {
        self.items.remove(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains_item(&self, item: &InkListItem) -> bool {
        self.items.contains_key(item)
    }

    pub fn contains_item_named(&self, item_name: &str) -> bool {
        self.items.keys().any(|item| item.item_name == item_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&InkListItem, i32)> {
        self.items.iter().map(|(item, value)| (item, *value))
    }

    /// Items by rank, ties broken by origin name.
    pub fn ordered_items(&self) -> Vec<(&InkListItem, i32)> {
        let mut ordered = self.iter().collect::<Vec<_>>();
        ordered.sort_by(|(a_item, a_value), (b_item, b_value)| {
            a_value
                .cmp(b_value)
                .then_with(|| a_item.origin_name.cmp(&b_item.origin_name))
        });
        ordered
    }

    pub fn origin_names(&self) -> Vec<String> {
        if self.items.is_empty() {
            return self.initial_origin_names.clone();
        }
        self.items
            .keys()
            .filter_map(|item| item.origin_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn initial_origin_names(&self) -> &[String] {
        &self.initial_origin_names
    }

    pub fn set_initial_origin_names(&mut self, names: Vec<String>) {
        self.initial_origin_names = names;
    }

    pub fn max_item(&self) -> Option<(&InkListItem, i32)> {
        self.iter().fold(None, |best, (item, value)| match best {
            Some((_, best_value)) if best_value >= value => best,
            _ => Some((item, value)),
        })
    }

    pub fn min_item(&self) -> Option<(&InkListItem, i32)> {
        self.iter().fold(None, |best, (item, value)| match best {
            Some((_, best_value)) if best_value <= value => best,
            _ => Some((item, value)),
        })
    }

    pub fn origin_of_max_item<'a>(
        &self,
        definitions: &'a ListDefinitions,
    ) -> Option<&'a ListDefinition> {
        let (item, _) = self.max_item()?;
        definitions.definition(item.origin_name.as_deref()?)
    }

    fn origins<'a>(&self, definitions: &'a ListDefinitions) -> Vec<&'a ListDefinition> {
        self.origin_names()
            .iter()
            .filter_map(|name| definitions.definition(name))
            .collect()
    }

    fn copy_with_items(&self, items: BTreeMap<InkListItem, i32>) -> Self {
        Self {
            items,
            initial_origin_names: self.origin_names(),
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut items = self.items.clone();
        items.extend(other.items.iter().map(|(k, v)| (k.clone(), *v)));
        self.copy_with_items(items)
    }

    pub fn intersect(&self, other: &Self) -> Self {
        let items = self
            .items
            .iter()
            .filter(|(item, _)| other.items.contains_key(*item))
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        self.copy_with_items(items)
    }

    pub fn without(&self, other: &Self) -> Self {
        let items = self
            .items
            .iter()
            .filter(|(item, _)| !other.items.contains_key(*item))
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        self.copy_with_items(items)
    }

    /// True when every item of `other` is present. Empty lists contain nothing
    /// and are contained by nothing.
    pub fn contains(&self, other: &Self) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        other.items.keys().all(|item| self.items.contains_key(item))
    }

    pub fn greater_than(&self, other: &Self) -> bool {
        let Some((_, min)) = self.min_item() else {
            return false;
        };
        let Some((_, other_max)) = other.max_item() else {
            return true;
        };
        min > other_max
    }

    pub fn greater_than_or_equals(&self, other: &Self) -> bool {
        let (Some((_, min)), Some((_, max))) = (self.min_item(), self.max_item()) else {
            return false;
        };
        let (Some((_, other_min)), Some((_, other_max))) = (other.min_item(), other.max_item())
        else {
            return true;
        };
        min >= other_min && max >= other_max
    }

    pub fn less_than(&self, other: &Self) -> bool {
        let Some((_, other_min)) = other.min_item() else {
            return false;
        };
        let Some((_, max)) = self.max_item() else {
            return true;
        };
        max < other_min
    }

    pub fn less_than_or_equals(&self, other: &Self) -> bool {
        let (Some((_, other_min)), Some((_, other_max))) = (other.min_item(), other.max_item())
        else {
            return false;
        };
        let (Some((_, min)), Some((_, max))) = (self.min_item(), self.max_item()) else {
            return true;
        };
        max <= other_max && min <= other_min
    }

    pub fn max_as_list(&self) -> Self {
        match self.max_item() {
            Some((item, value)) => Self::from_item(item.clone(), value),
            None => Self::new(),
        }
    }

    pub fn min_as_list(&self) -> Self {
        match self.min_item() {
            Some((item, value)) => Self::from_item(item.clone(), value),
            None => Self::new(),
        }
    }

    /// Every item of this list's origins.
    pub fn all(&self, definitions: &ListDefinitions) -> Self {
        let mut all = Self::new();
        for origin in self.origins(definitions) {
            for (item, value) in origin.items() {
                all.insert(item, value);
            }
        }
        all.initial_origin_names = self.origin_names();
        all
    }

    /// Items of this list's origins that are not in the list.
    pub fn inverse(&self, definitions: &ListDefinitions) -> Self {
        let mut inverse = Self::new();
        for origin in self.origins(definitions) {
            for (item, value) in origin.items() {
                if !self.items.contains_key(&item) {
                    inverse.insert(item, value);
                }
            }
        }
        inverse.initial_origin_names = self.origin_names();
        inverse
    }

    /// Items whose ranks fall within `min..=max`.
    pub fn list_with_sub_range(&self, min: i32, max: i32) -> Self {
        let items = self
            .items
            .iter()
            .filter(|(_, value)| **value >= min && **value <= max)
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        Self {
            items,
            initial_origin_names: self.initial_origin_names.clone(),
        }
    }
}

impl fmt::Display for InkList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self
            .ordered_items()
            .into_iter()
            .map(|(item, _)| item.item_name.as_str())
            .collect::<Vec<_>>();
        f.write_str(&names.join(", "))
    }
}
