///
/// Metadata resolution and caching.
///
/// Resolving a record type turns its declared `Schema` into an ordered map
/// from column name to `FieldDescriptor`, flattening embedded sub-records
/// and applying the skip, primary-key and ignore markers for one
/// `ResolveMode`. The `Registry` memoizes every (type, mode) pair for its
/// own lifetime. Lookups take the read lock; only a first resolution takes
/// the write lock, and a racing duplicate resolution of the same key is
/// discarded in favour of the entry already stored.
///

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use smallvec::smallvec;

use crate::error::{Error, Result};
use crate::naming::NameMapper;
use crate::schema::{FieldKind, FieldPath, Record, Schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolveMode {
    pub include_primary_key: bool,
    pub apply_ignore: bool,
}

impl ResolveMode {
    /// Every mappable column; used for projection and scanning.
    pub const ALL: ResolveMode = ResolveMode {
        include_primary_key: true,
        apply_ignore: false,
    };

    /// Columns written by INSERT and UPDATE.
    pub const WRITABLE: ResolveMode = ResolveMode {
        include_primary_key: false,
        apply_ignore: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Ordinary,
    PrimaryKey,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub column: String,
    pub path: FieldPath,
    pub role: FieldRole,
}

impl FieldDescriptor {
    /// True when the field lives inside a flattened sub-record.
    pub fn is_embedded(&self) -> bool {
        self.path.len() > 1
    }
}

/// Column name to descriptor, in structural order.
pub type FieldMap = IndexMap<String, FieldDescriptor>;

type FieldCache = HashMap<(TypeId, ResolveMode), Arc<FieldMap>>;

pub struct Registry {
    names: NameMapper,
    fields: RwLock<FieldCache>,
    keys: RwLock<HashMap<TypeId, Arc<FieldDescriptor>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::with_names(NameMapper::default())
    }

    pub fn with_names(names: NameMapper) -> Self {
        Registry {
            names,
            fields: RwLock::new(HashMap::new()),
            keys: RwLock::new(HashMap::new()),
        }
    }

    pub fn names(&self) -> &NameMapper {
        &self.names
    }

    pub fn map_name(&self, name: &str) -> String {
        self.names.map(name)
    }

    pub fn resolve<R: Record>(&self, mode: ResolveMode) -> Arc<FieldMap> {
        self.cached(TypeId::of::<R>(), mode, R::schema)
    }

    pub fn resolve_schema(&self, schema: &Schema, mode: ResolveMode) -> Arc<FieldMap> {
        self.cached(schema.type_id, mode, || schema.clone())
    }

    /// The single primary-key field of `R`, embedded fields included.
    pub fn primary_key<R: Record>(&self) -> Result<Arc<FieldDescriptor>> {
        let type_id = TypeId::of::<R>();
        {
            let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(found) = keys.get(&type_id) {
                return Ok(Arc::clone(found));
            }
        }

        let fields = self.resolve::<R>(ResolveMode::ALL);
        let candidates: Vec<&FieldDescriptor> = fields
            .values()
            .filter(|d| d.role == FieldRole::PrimaryKey)
            .collect();

        let [key] = candidates.as_slice() else {
            return Err(Error::PrimaryKey {
                type_name: std::any::type_name::<R>(),
                found: candidates.len(),
            });
        };

        let key = Arc::new((*key).clone());
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(keys.entry(type_id).or_insert(key)))
    }

    /// Number of cached (type, mode) entries.
    pub fn len(&self) -> usize {
        self.fields.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.fields.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.keys.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn cached<F>(&self, type_id: TypeId, mode: ResolveMode, schema: F) -> Arc<FieldMap>
    where
        F: FnOnce() -> Schema,
    {
        {
            let cache = self.fields.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(found) = cache.get(&(type_id, mode)) {
                return Arc::clone(found);
            }
        }

        let schema = schema();
        let built = Arc::new(self.build(&schema, mode));
        tracing::debug!(
            record = schema.type_name,
            include_primary_key = mode.include_primary_key,
            apply_ignore = mode.apply_ignore,
            columns = built.len(),
            "resolved record metadata"
        );

        let mut cache = self.fields.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cache.entry((type_id, mode)).or_insert(built))
    }

    fn build(&self, schema: &Schema, mode: ResolveMode) -> FieldMap {
        let mut map = FieldMap::with_capacity(schema.fields.len());

        for (index, spec) in schema.fields.iter().enumerate() {
            if spec.skip
                || (spec.primary_key && !mode.include_primary_key)
                || (spec.ignore && mode.apply_ignore)
            {
                continue;
            }

            if let FieldKind::Embedded(nested) = spec.kind {
                let nested = nested();
                let inner = self.cached(nested.type_id, mode, || nested);
                for (column, descriptor) in inner.iter() {
                    let mut path = FieldPath::with_capacity(descriptor.path.len() + 1);
                    path.push(index);
                    path.extend_from_slice(&descriptor.path);
                    map.insert(
                        column.clone(),
                        FieldDescriptor {
                            column: column.clone(),
                            path,
                            role: descriptor.role,
                        },
                    );
                }
                continue;
            }

            let column = self.names.map(spec.raw_name());
            let role = if spec.primary_key {
                FieldRole::PrimaryKey
            } else if spec.ignore {
                FieldRole::Ignored
            } else {
                FieldRole::Ordinary
            };
            map.insert(
                column.clone(),
                FieldDescriptor {
                    column,
                    path: smallvec![index],
                    role,
                },
            );
        }

        map
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.names)
            .field("cached", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    #[derive(Debug, Default)]
    struct Stamp {
        created: String,
        id: i64,
    }

    #[derive(Debug, Default)]
    struct Account {
        id: i64,
        secret: String,
        full_name: String,
        password: String,
        stamp: Stamp,
    }

    #[derive(Debug, Default)]
    struct TwoKeys {
        a: i64,
        b: i64,
    }

    #[derive(Debug, Default)]
    struct NoKey {
        a: i64,
    }

    record!(Stamp {
        created: String => value,
        id: i64 => value [column = "stamp_id"],
    });

    record!(Account {
        id: i64 => value [primary_key],
        secret: String => value [skip],
        full_name: String => value [column = "FullName"],
        password: String => value [ignore],
        stamp: Stamp => embedded,
    });

    record!(TwoKeys {
        a: i64 => value [primary_key],
        b: i64 => value [primary_key],
    });

    record!(NoKey {
        a: i64 => value,
    });

    fn columns(map: &FieldMap) -> Vec<&str> {
        map.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_resolve_all_flattens_embedded_records() {
        let registry = Registry::new();
        let map = registry.resolve::<Account>(ResolveMode::ALL);

        assert_eq!(
            columns(&map),
            vec!["id", "fullname", "password", "created", "stamp_id"]
        );
        assert_eq!(map["id"].role, FieldRole::PrimaryKey);
        assert_eq!(map["password"].role, FieldRole::Ignored);
        assert_eq!(map["fullname"].path.as_slice(), &[2]);
        assert_eq!(map["created"].path.as_slice(), &[4, 0]);
        assert_eq!(map["stamp_id"].path.as_slice(), &[4, 1]);
        assert!(map["stamp_id"].is_embedded());
        assert!(!map["id"].is_embedded());
    }

    #[test]
    fn test_resolve_writable_drops_key_and_ignored() {
        let registry = Registry::new();
        let map = registry.resolve::<Account>(ResolveMode::WRITABLE);
        assert_eq!(columns(&map), vec!["fullname", "created", "stamp_id"]);
    }

    #[test]
    fn test_cache_is_keyed_by_type_and_mode() {
        let registry = Registry::new();
        assert!(registry.is_empty());

        let first = registry.resolve::<Account>(ResolveMode::ALL);
        // Account plus the embedded Stamp
        assert_eq!(registry.len(), 2);

        let second = registry.resolve::<Account>(ResolveMode::ALL);
        assert!(Arc::ptr_eq(&first, &second));

        registry.resolve::<Account>(ResolveMode::WRITABLE);
        assert_eq!(registry.len(), 4);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_resolve_schema_shares_the_typed_cache() {
        let registry = Registry::new();
        let typed = registry.resolve::<Account>(ResolveMode::ALL);

        let by_schema = registry.resolve_schema(&Account::schema(), ResolveMode::ALL);
        assert!(Arc::ptr_eq(&typed, &by_schema));
        assert_eq!(registry.len(), 2);

        let stamp = registry.resolve_schema(&Stamp::schema(), ResolveMode::ALL);
        assert_eq!(columns(&stamp), vec!["created", "stamp_id"]);
        assert!(Arc::ptr_eq(&stamp, &registry.resolve::<Stamp>(ResolveMode::ALL)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_snake_case_registry() {
        let registry = Registry::with_names(NameMapper::snake());
        let map = registry.resolve::<Account>(ResolveMode::ALL);
        assert!(map.contains_key("full_name"));
    }

    #[test]
    fn test_later_field_wins_on_collision() {
        #[derive(Debug, Default)]
        struct Clash {
            name: String,
            other: String,
        }
        record!(Clash {
            name: String => value,
            other: String => value [column = "name"],
        });

        let registry = Registry::new();
        let map = registry.resolve::<Clash>(ResolveMode::ALL);
        assert_eq!(map.len(), 1);
        assert_eq!(map["name"].path.as_slice(), &[1]);
    }

    #[test]
    fn test_primary_key_requires_exactly_one() {
        let registry = Registry::new();

        let key = registry.primary_key::<Account>().unwrap();
        assert_eq!(key.column, "id");
        assert_eq!(key.path.as_slice(), &[0]);

        let again = registry.primary_key::<Account>().unwrap();
        assert!(Arc::ptr_eq(&key, &again));

        match registry.primary_key::<TwoKeys>() {
            Err(Error::PrimaryKey { found, .. }) => assert_eq!(found, 2),
            other => panic!("Expected PrimaryKey error, got {:?}", other),
        }

        match registry.primary_key::<NoKey>() {
            Err(Error::PrimaryKey { found, .. }) => assert_eq!(found, 0),
            other => panic!("Expected PrimaryKey error, got {:?}", other),
        }
    }

    #[test]
    fn test_general_resolution_does_not_check_key_cardinality() {
        let registry = Registry::new();
        let map = registry.resolve::<TwoKeys>(ResolveMode::ALL);
        assert_eq!(map.len(), 2);
    }
}
