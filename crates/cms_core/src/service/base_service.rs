//! Generic entity use-case service.
//!
//! # Responsibility
//! - Provide paginated listing, detail, create/update/delete/restore and
//!   tree helpers for any entity kind.
//! - Decide trash policy and reparent intent above the repository.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Trash behavior is active only when both the options and the kind allow it.
//! - A reparent write happens only when the resolved parent id changes.

use crate::config::{CoreConfig, PaginationConfig};
use crate::model::kind::EntityKind;
use crate::model::record::{FieldMap, Record, RecordId, TreeNode};
use crate::repo::base_repo::BaseRepository;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::query::{ListQuery, RecordFilter, TrashedMode};
use serde::Serialize;

/// Per-service behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceOptions {
    pub enable_trash: bool,
    pub default_page: u32,
    pub default_limit: u32,
    pub max_limit: u32,
}

impl ServiceOptions {
    /// Options for `kind` with trash enabled wherever the kind supports it.
    pub fn for_kind(kind: EntityKind, pagination: &PaginationConfig) -> Self {
        let pagination = pagination.normalized();
        Self {
            enable_trash: kind.descriptor().supports_trash,
            default_page: pagination.default_page,
            default_limit: pagination.default_limit,
            max_limit: pagination.max_limit,
        }
    }

    pub fn from_config(kind: EntityKind, config: &CoreConfig) -> Self {
        Self::for_kind(kind, &config.pagination)
    }

    pub fn with_trash(mut self, enable_trash: bool) -> Self {
        self.enable_trash = enable_trash;
        self
    }
}

/// Raw paging request; values below 1 fall back to defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginateOptions {
    pub page: i64,
    pub limit: i64,
    pub trashed: TrashedMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub total_items: u64,
    pub item_count: usize,
    pub per_page: u32,
    pub total_pages: u64,
    pub current_page: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginated {
    pub items: Vec<Record>,
    pub meta: PageMeta,
}

/// Create request; `parent_id` only applies to tree kinds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateInput {
    pub fields: FieldMap,
    pub parent_id: Option<RecordId>,
}

/// Requested parent after an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParentChange {
    /// Leave the parent untouched.
    #[default]
    Keep,
    /// Move to root level.
    Root,
    /// Move below the given record.
    To(RecordId),
}

/// Update request; `fields` are merged over the stored values.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateInput {
    pub id: RecordId,
    pub fields: FieldMap,
    pub parent: ParentChange,
}

impl UpdateInput {
    pub fn fields(id: RecordId, fields: FieldMap) -> Self {
        Self {
            id,
            fields,
            parent: ParentChange::Keep,
        }
    }
}

/// Use-case service over one entity kind's repository.
pub struct BaseService<R: BaseRepository> {
    repo: R,
    options: ServiceOptions,
}

impl<R: BaseRepository> BaseService<R> {
    /// Creates a service; trash is forced off for kinds without support.
    pub fn new(repo: R, options: ServiceOptions) -> Self {
        let supports_trash = repo.descriptor().supports_trash;
        Self {
            repo,
            options: ServiceOptions {
                enable_trash: options.enable_trash && supports_trash,
                ..options
            },
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn options(&self) -> ServiceOptions {
        self.options
    }

    /// Lists one page in the kind's default order.
    pub fn paginate(&self, options: PaginateOptions) -> RepoResult<Paginated> {
        let page = if options.page < 1 {
            self.options.default_page
        } else {
            u32::try_from(options.page).unwrap_or(u32::MAX)
        };
        let limit = if options.limit < 1 {
            self.options.default_limit
        } else {
            u32::try_from(options.limit).unwrap_or(u32::MAX)
        }
        .min(self.options.max_limit);

        let trashed = if self.options.enable_trash {
            options.trashed
        } else {
            TrashedMode::None
        };
        let offset = u64::from(page - 1) * u64::from(limit);
        let query = ListQuery {
            trashed,
            filter: RecordFilter::default(),
            limit: Some(limit),
            offset: u32::try_from(offset).unwrap_or(u32::MAX),
        };

        let total_items = self.repo.count(&query)?;
        let items = self.repo.find_many(&query)?;
        Ok(Paginated {
            meta: PageMeta {
                total_items,
                item_count: items.len(),
                per_page: limit,
                total_pages: total_items.div_ceil(u64::from(limit)),
                current_page: page,
            },
            items,
        })
    }

    /// Trashed records are visible only when trash is enabled.
    pub fn detail(&self, id: RecordId) -> RepoResult<Record> {
        self.repo.find_by_id(id, self.options.enable_trash)
    }

    pub fn create(&self, input: CreateInput) -> RepoResult<Record> {
        let kind = self.repo.kind();
        if input.parent_id.is_some() && !self.repo.descriptor().is_tree {
            return Err(RepoError::invalid_operation(
                kind,
                "parent requires a tree kind",
            ));
        }

        let mut record = Record::new(kind, input.fields);
        if let Some(parent_id) = input.parent_id {
            self.repo.find_by_id(parent_id, false)?;
            record.set_parent(Some(parent_id));
        }
        self.repo.save(&record)
    }

    pub fn update(&self, input: UpdateInput) -> RepoResult<Record> {
        let kind = self.repo.kind();
        let mut record = self.repo.find_by_id(input.id, self.options.enable_trash)?;
        record.fields.extend(input.fields);

        let target = match input.parent {
            ParentChange::Keep => None,
            _ if !self.repo.descriptor().is_tree => {
                return Err(RepoError::invalid_operation(
                    kind,
                    "parent requires a tree kind",
                ));
            }
            ParentChange::Root => Some(None),
            ParentChange::To(parent_id) => Some(Some(parent_id)),
        };
        if let Some(parent_id) = target.filter(|parent_id| *parent_id != record.parent_id()) {
            if let Some(parent_id) = parent_id {
                self.repo.find_by_id(parent_id, false)?;
            }
            record.set_parent(parent_id);
        }
        self.repo.save(&record)
    }

    /// Deletes `ids`; soft when trash is enabled and requested.
    ///
    /// A soft request on an already trashed record removes it permanently.
    pub fn delete(&self, ids: &[RecordId], use_trash: bool) -> RepoResult<usize> {
        if !(use_trash && self.options.enable_trash) {
            return self.repo.delete(ids, false);
        }

        let mut active = Vec::new();
        let mut trashed = Vec::new();
        for id in ids {
            match self.repo.find_by_id(*id, true) {
                Ok(record) if record.is_trashed() => trashed.push(*id),
                Ok(_) => active.push(*id),
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        let soft = self.repo.delete(&active, true)?;
        let hard = self.repo.delete(&trashed, false)?;
        Ok(soft + hard)
    }

    pub fn restore(&self, ids: &[RecordId]) -> RepoResult<usize> {
        if !self.options.enable_trash {
            return Err(RepoError::invalid_operation(
                self.repo.kind(),
                "trash is disabled",
            ));
        }
        self.repo.restore(ids)
    }

    /// Active forest.
    pub fn trees(&self) -> RepoResult<Vec<TreeNode>> {
        self.repo.find_trees(false)
    }

    /// Ancestors of `id`, root-first.
    pub fn ancestors(&self, id: RecordId) -> RepoResult<Vec<Record>> {
        let record = self.detail(id)?;
        self.repo.flat_ancestors_tree(&record)
    }

    /// Active descendants of `id`, flat.
    pub fn descendants(&self, id: RecordId) -> RepoResult<Vec<Record>> {
        let record = self.detail(id)?;
        self.repo.find_descendants(&record, false)
    }

    /// `id` with its active descendants attached.
    pub fn subtree(&self, id: RecordId) -> RepoResult<TreeNode> {
        let record = self.detail(id)?;
        self.repo.find_descendants_tree(&record, false)
    }
}
