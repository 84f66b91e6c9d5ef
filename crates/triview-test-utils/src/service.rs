use async_trait::async_trait;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Semaphore;
use triview_model::{Direction, Entity, Page, PageRequest};
use triview_query::{QueryService, ServiceError};

const SORTABLE_FIELDS: &[&str] = &[
    "id",
    "kind",
    "declaredName",
    "declaredShortName",
    "text",
    "status",
    "createdAt",
    "updatedAt",
];

/// Query service over an in-memory entity list
///
/// Evaluates filter, search, sort and paging the way a backend would.
/// Failures can be scripted, and a gated service holds every response until
/// [`InMemoryQueryService::release`] hands out a permit.
#[derive(Debug, Default)]
pub struct InMemoryQueryService {
    entities: Mutex<Vec<Entity>>,
    failures: Mutex<VecDeque<ServiceError>>,
    requests: Mutex<Vec<PageRequest>>,
    gate: Option<Arc<Semaphore>>,
}

impl InMemoryQueryService {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self {
            entities: Mutex::new(entities),
            ..Self::default()
        }
    }

    /// Service whose responses wait for [`Self::release`]
    pub fn gated(entities: Vec<Entity>) -> Self {
        Self {
            entities: Mutex::new(entities),
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    /// Let `count` held responses through, in arrival order
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    /// Fail the next call with `error`; queued failures are used in order
    pub fn fail_next(&self, error: ServiceError) {
        self.failures.lock().push_back(error);
    }

    /// Replace the served entity list
    pub fn set_entities(&self, entities: Vec<Entity>) {
        *self.entities.lock() = entities;
    }

    /// Upsert one served entity by id
    pub fn upsert(&self, entity: Entity) {
        let mut entities = self.entities.lock();
        match entities.iter_mut().find(|e| e.id == entity.id) {
            Some(slot) => *slot = entity,
            None => entities.push(entity),
        }
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn answer(&self, request: &PageRequest) -> Result<Page, ServiceError> {
        if let Some(unknown) = request
            .sort
            .iter()
            .find(|s| !SORTABLE_FIELDS.contains(&s.field.as_str()))
        {
            return Err(ServiceError::status(
                400,
                format!("unknown sort field: {}", unknown.field),
            ));
        }
        if request.size == 0 {
            return Err(ServiceError::status(400, "page size must be positive"));
        }

        let mut matched: Vec<Entity> = self
            .entities
            .lock()
            .iter()
            .filter(|e| request.matches(e))
            .cloned()
            .collect();

        if !request.sort.is_empty() {
            matched.sort_by(|a, b| {
                request
                    .sort
                    .iter()
                    .map(|spec| {
                        let ord = a.field_value(&spec.field).cmp(&b.field_value(&spec.field));
                        match spec.direction {
                            Direction::Asc => ord,
                            Direction::Desc => ord.reverse(),
                        }
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let size = request.size as usize;
        let total = matched.len();
        let total_pages = total.div_ceil(size);
        let start = (request.page as usize).saturating_mul(size).min(total);
        let end = start.saturating_add(size).min(total);

        Ok(Page {
            content: matched.drain(start..end).collect(),
            page: request.page,
            size: request.size,
            total_elements: total as u64,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
            first: request.page == 0,
            last: (request.page as usize) + 1 >= total_pages,
        })
    }
}

#[async_trait]
impl QueryService for InMemoryQueryService {
    async fn query(&self, request: PageRequest) -> Result<Page, ServiceError> {
        self.requests.lock().push(request.clone());

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }
        self.answer(&request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample_model;
    use triview_model::{Filter, SortSpec};

    #[tokio::test]
    async fn pages_filtered_and_sorted_results() {
        let service = InMemoryQueryService::new(sample_model());
        let mut request = PageRequest::new(1, 2);
        request.filter.insert(Filter::new("kind", "usage"));
        request.sort.push(SortSpec::desc("id"));

        let page = service.query(request).await.unwrap();
        let ids: Vec<&str> = page.content.iter().map(|e| e.id.as_str()).collect();

        assert_eq!(ids, vec!["U-2", "U-1"]);
        assert_eq!(page.total_elements, 4);
        assert_eq!(page.total_pages, 2);
        assert!(page.last && !page.first);
    }

    #[tokio::test]
    async fn unknown_sort_field_is_rejected() {
        let service = InMemoryQueryService::new(sample_model());
        let mut request = PageRequest::new(0, 10);
        request.sort.push(SortSpec::asc("colour"));

        let err = service.query(request).await.unwrap_err();
        assert!(matches!(err, ServiceError::Status { code: 400, .. }));
    }

    #[tokio::test]
    async fn scripted_failures_are_used_once() {
        let service = InMemoryQueryService::new(sample_model());
        service.fail_next(ServiceError::no_response("offline"));

        assert!(service.query(PageRequest::new(0, 5)).await.is_err());
        assert!(service.query(PageRequest::new(0, 5)).await.is_ok());
        assert_eq!(service.call_count(), 2);
    }
}
