//! Pet recommendations
//!
//! Listings are ranked by popularity: the number of distinct users whose
//! liked set contains the listing. A resolved requester never sees their own
//! listings or listings they already liked. Ties keep the store order.

use common::{
    models::{AccountType, Pet, Sex, User},
    repositories::{PetStore, UserStore},
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

use crate::{error::ApiResult, middleware::AuthGate};

const DEFAULT_PAGE_SIZE: usize = 10;

/// Raw query parameters; every value is parsed leniently
#[derive(Debug, Default, Deserialize)]
pub struct RecommendationQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub page_size: Option<String>,
    #[serde(rename = "type")]
    pub pet_type: Option<String>,
    pub sterilized: Option<String>,
    pub sex: Option<String>,
    pub weight: Option<String>,
    pub owner_type: Option<String>,
}

/// Exact-match filters; `None` constrains nothing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PetFilters {
    pub pet_type: Option<String>,
    pub sterilized: Option<bool>,
    pub sex: Option<Sex>,
    pub weight: Option<f64>,
    pub owner_type: Option<AccountType>,
}

impl PetFilters {
    /// Malformed values are treated as absent
    pub fn from_query(query: &RecommendationQuery) -> Self {
        let value = |raw: &Option<String>| {
            raw.as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            pet_type: value(&query.pet_type),
            sterilized: value(&query.sterilized).and_then(|v| {
                match v.to_ascii_lowercase().as_str() {
                    "true" => Some(true),
                    "false" => Some(false),
                    _ => None,
                }
            }),
            sex: value(&query.sex).and_then(|v| v.parse().ok()),
            weight: value(&query.weight)
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|w| w.is_finite()),
            owner_type: value(&query.owner_type).and_then(|v| v.parse().ok()),
        }
    }

    /// Whether the pet satisfies every present filter
    ///
    /// A pet whose owner is not in `owners` fails an owner-type filter.
    pub fn matches(&self, pet: &Pet, owners: &HashMap<Uuid, &User>) -> bool {
        if let Some(pet_type) = &self.pet_type {
            if &pet.pet_type != pet_type {
                return false;
            }
        }

        if let Some(sterilized) = self.sterilized {
            if pet.sterilized != Some(sterilized) {
                return false;
            }
        }

        if let Some(sex) = self.sex {
            if pet.sex != Some(sex) {
                return false;
            }
        }

        if let Some(weight) = self.weight {
            if pet.weight != weight {
                return false;
            }
        }

        if let Some(owner_type) = self.owner_type {
            match owners.get(&pet.owner_id) {
                Some(owner) if owner.account_type == owner_type => {}
                _ => return false,
            }
        }

        true
    }
}

/// One-indexed page selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// `page` below 1 becomes 1; a page size of 0 or less becomes the default.
    /// `limit` wins over `page_size` when both are given.
    pub fn from_query(query: &RecommendationQuery) -> Self {
        let parse = |raw: &Option<String>| raw.as_deref().and_then(leading_count);

        let page = parse(&query.page).filter(|p| *p >= 1).unwrap_or(1);

        let page_size = parse(&query.limit)
            .or_else(|| parse(&query.page_size))
            .filter(|s| *s >= 1)
            .unwrap_or(DEFAULT_PAGE_SIZE);

        Self { page, page_size }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// Leading decimal integer of `raw`, so `"2.5"` is 2 and `"5abc"` is 5.
///
/// Negative values and strings without leading digits yield `None`; values
/// past `usize::MAX` saturate.
fn leading_count(raw: &str) -> Option<usize> {
    let raw = raw.trim_start();
    let (negative, rest) = match raw.as_bytes().first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        _ => (false, raw),
    };

    let digits: Vec<usize> = rest
        .chars()
        .map_while(|c| c.to_digit(10))
        .map(|d| d as usize)
        .collect();
    if digits.is_empty() {
        return None;
    }

    let value = digits
        .into_iter()
        .fold(0usize, |acc, d| acc.saturating_mul(10).saturating_add(d));

    if negative && value > 0 {
        None
    } else {
        Some(value)
    }
}

/// A pet together with its like count
#[derive(Debug, Clone, Serialize)]
pub struct RecommendedPet {
    #[serde(flatten)]
    pub pet: Pet,
    pub likes_count: usize,
}

/// Like counts per pet id; a user counts at most once per pet
pub fn popularity(users: &[User]) -> HashMap<Uuid, usize> {
    let mut counts = HashMap::new();

    for user in users {
        let distinct: HashSet<&Uuid> = user.liked.iter().collect();
        for pet_id in distinct {
            *counts.entry(*pet_id).or_insert(0) += 1;
        }
    }

    counts
}

/// Rank a snapshot of pets and users into one page of recommendations
pub fn rank_pets(
    pets: Vec<Pet>,
    users: &[User],
    filters: &PetFilters,
    requester: Option<Uuid>,
    pagination: Pagination,
) -> Vec<RecommendedPet> {
    let counts = popularity(users);
    let owners: HashMap<Uuid, &User> = users.iter().map(|u| (u.id, u)).collect();

    // A requester missing from the snapshot gets unpersonalized results
    let requester = requester.and_then(|id| owners.get(&id).copied());

    let mut ranked: Vec<RecommendedPet> = pets
        .into_iter()
        .filter(|pet| match requester {
            Some(user) => pet.owner_id != user.id && !user.has_liked(pet.id),
            None => true,
        })
        .filter(|pet| filters.matches(pet, &owners))
        .map(|pet| RecommendedPet {
            likes_count: counts.get(&pet.id).copied().unwrap_or(0),
            pet,
        })
        .collect();

    // Stable, so equal counts keep the store order
    ranked.sort_by(|a, b| b.likes_count.cmp(&a.likes_count));

    ranked
        .into_iter()
        .skip(pagination.offset())
        .take(pagination.page_size)
        .collect()
}

/// Load the current pets and users and rank them for the requester
///
/// A credential that does not resolve only disables personalization.
pub async fn recommend(
    users: &dyn UserStore,
    pets: &dyn PetStore,
    gate: &AuthGate,
    filters: &PetFilters,
    pagination: Pagination,
    credential: Option<&str>,
) -> ApiResult<Vec<RecommendedPet>> {
    let requester = match credential {
        Some(header) => gate.authenticate(Some(header)).await.into_user(),
        None => None,
    };

    if credential.is_some() && requester.is_none() {
        debug!("Recommendation credential did not resolve, skipping personalization");
    }

    let all_pets = pets.find_all().await?;
    let all_users = users.find_all().await?;

    Ok(rank_pets(
        all_pets,
        &all_users,
        filters,
        requester.map(|user| user.id),
        pagination,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::test_support::{FailingStore, bearer, jwt_service, pet, user};
    use common::repositories::MemoryStore;
    use std::sync::Arc;

    /// Users whose liked sets give each pet the requested number of likes
    fn likers(likes: &[(Uuid, usize)]) -> Vec<User> {
        let max = likes.iter().map(|(_, n)| *n).max().unwrap_or(0);
        (0..max)
            .map(|i| {
                let mut u = user(&format!("+7700000{:04}", i));
                u.liked = likes
                    .iter()
                    .filter(|(_, n)| *n > i)
                    .map(|(id, _)| *id)
                    .collect();
                u
            })
            .collect()
    }

    fn names(ranked: &[RecommendedPet]) -> Vec<&str> {
        ranked.iter().map(|r| r.pet.name.as_str()).collect()
    }

    fn query(pairs: &[(&str, &str)]) -> RecommendationQuery {
        let encoded = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let uri: axum::http::Uri = format!("/?{}", encoded).parse().unwrap();
        axum::extract::Query::<RecommendationQuery>::try_from_uri(&uri)
            .unwrap()
            .0
    }

    /// A(3 likes, dog), B(5 likes, dog), C(1 like, cat)
    fn fixture() -> (Vec<Pet>, Vec<User>) {
        let owner = user("+77019999999");
        let a = pet("A", "dog", owner.id);
        let b = pet("B", "dog", owner.id);
        let c = pet("C", "cat", owner.id);

        let mut users = likers(&[(a.id, 3), (b.id, 5), (c.id, 1)]);
        users.push(owner);
        (vec![a, b, c], users)
    }

    #[test]
    fn test_type_filter_ranks_by_likes() {
        let (pets, users) = fixture();
        let filters = PetFilters {
            pet_type: Some("dog".to_string()),
            ..Default::default()
        };

        let ranked = rank_pets(pets, &users, &filters, None, Pagination::default());
        assert_eq!(names(&ranked), vec!["B", "A"]);
        assert_eq!(ranked[0].likes_count, 5);
        assert_eq!(ranked[1].likes_count, 3);
    }

    #[test]
    fn test_requester_liked_pets_are_excluded() {
        let (pets, mut users) = fixture();
        let mut requester = user("+77018888888");
        requester.liked = vec![pets[0].id];
        let requester_id = requester.id;
        users.push(requester);

        let dogs = PetFilters {
            pet_type: Some("dog".to_string()),
            ..Default::default()
        };
        let ranked = rank_pets(
            pets.clone(),
            &users,
            &dogs,
            Some(requester_id),
            Pagination::default(),
        );
        assert_eq!(names(&ranked), vec!["B"]);

        let ranked = rank_pets(
            pets,
            &users,
            &PetFilters::default(),
            Some(requester_id),
            Pagination::default(),
        );
        assert_eq!(names(&ranked), vec!["B", "C"]);
    }

    #[test]
    fn test_requester_own_pets_are_excluded() {
        let (pets, users) = fixture();
        let owner_id = pets[0].owner_id;

        let ranked = rank_pets(
            pets,
            &users,
            &PetFilters::default(),
            Some(owner_id),
            Pagination::default(),
        );
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_unknown_requester_is_not_personalized() {
        let (pets, users) = fixture();
        let ranked = rank_pets(
            pets,
            &users,
            &PetFilters::default(),
            Some(Uuid::new_v4()),
            Pagination::default(),
        );
        assert_eq!(names(&ranked), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_page_past_the_end_is_empty() {
        let owner = user("+77019999999");
        let pets: Vec<Pet> = (0..5).map(|i| pet(&format!("P{}", i), "dog", owner.id)).collect();
        let users = vec![owner];

        let ranked = rank_pets(
            pets,
            &users,
            &PetFilters::default(),
            None,
            Pagination {
                page: 3,
                page_size: 10,
            },
        );
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_pages_concatenate_to_full_ranking() {
        let owner = user("+77019999999");
        let pets: Vec<Pet> = (0..23).map(|i| pet(&format!("P{}", i), "dog", owner.id)).collect();
        let likes: Vec<(Uuid, usize)> = pets.iter().enumerate().map(|(i, p)| (p.id, i % 4)).collect();
        let mut users = likers(&likes);
        users.push(owner);

        let all = rank_pets(
            pets.clone(),
            &users,
            &PetFilters::default(),
            None,
            Pagination {
                page: 1,
                page_size: 100,
            },
        );
        assert_eq!(all.len(), 23);
        assert!(all.windows(2).all(|w| w[0].likes_count >= w[1].likes_count));

        for page_size in [1, 2, 5, 7, 10, 23, 30] {
            let mut collected = Vec::new();
            let mut page = 1;
            loop {
                let chunk = rank_pets(
                    pets.clone(),
                    &users,
                    &PetFilters::default(),
                    None,
                    Pagination { page, page_size },
                );
                assert!(chunk.len() <= page_size);
                if chunk.is_empty() {
                    break;
                }
                collected.extend(chunk.into_iter().map(|r| r.pet.id));
                page += 1;
            }

            let expected: Vec<Uuid> = all.iter().map(|r| r.pet.id).collect();
            assert_eq!(collected, expected, "page size {}", page_size);
        }
    }

    #[test]
    fn test_ties_keep_store_order() {
        let owner = user("+77019999999");
        let pets: Vec<Pet> = ["X", "Y", "Z"].iter().map(|n| pet(n, "dog", owner.id)).collect();
        let ranked = rank_pets(
            pets,
            &[owner],
            &PetFilters::default(),
            None,
            Pagination::default(),
        );
        assert_eq!(names(&ranked), vec!["X", "Y", "Z"]);
    }

    #[test]
    fn test_every_result_satisfies_every_filter() {
        let mut shelter = user("+77011111111");
        shelter.account_type = AccountType::Shelter;
        let private = user("+77012222222");

        let mut pets = Vec::new();
        for (i, owner) in [&shelter, &private].iter().enumerate() {
            for sterilized in [None, Some(true), Some(false)] {
                for sex in [None, Some(Sex::Male), Some(Sex::Female)] {
                    let mut p = pet("P", if i == 0 { "dog" } else { "cat" }, owner.id);
                    p.sterilized = sterilized;
                    p.sex = sex;
                    p.weight = if sex == Some(Sex::Male) { 4.5 } else { 3.0 };
                    pets.push(p);
                }
            }
        }
        // Orphaned listing; fails any owner-type filter
        pets.push(pet("orphan", "dog", Uuid::new_v4()));

        let users = vec![shelter, private];
        let owners: HashMap<Uuid, &User> = users.iter().map(|u| (u.id, u)).collect();

        let filter_sets = [
            PetFilters::default(),
            PetFilters {
                sterilized: Some(false),
                ..Default::default()
            },
            PetFilters {
                sex: Some(Sex::Female),
                sterilized: Some(true),
                ..Default::default()
            },
            PetFilters {
                weight: Some(4.5),
                owner_type: Some(AccountType::Shelter),
                ..Default::default()
            },
            PetFilters {
                pet_type: Some("cat".to_string()),
                owner_type: Some(AccountType::Private),
                ..Default::default()
            },
        ];

        for filters in &filter_sets {
            let ranked = rank_pets(
                pets.clone(),
                &users,
                filters,
                None,
                Pagination {
                    page: 1,
                    page_size: 1000,
                },
            );
            let expected = pets.iter().filter(|p| filters.matches(p, &owners)).count();
            assert_eq!(ranked.len(), expected, "{:?}", filters);

            for r in &ranked {
                let p = &r.pet;
                if let Some(t) = &filters.pet_type {
                    assert_eq!(&p.pet_type, t);
                }
                if let Some(s) = filters.sterilized {
                    assert_eq!(p.sterilized, Some(s));
                }
                if let Some(s) = filters.sex {
                    assert_eq!(p.sex, Some(s));
                }
                if let Some(w) = filters.weight {
                    assert_eq!(p.weight, w);
                }
                if let Some(t) = filters.owner_type {
                    assert_eq!(owners[&p.owner_id].account_type, t);
                }
            }
        }

        // Unknown sterilization never matches `false`
        let unsterilized = PetFilters {
            sterilized: Some(false),
            ..Default::default()
        };
        let ranked = rank_pets(pets, &users, &unsterilized, None, Pagination { page: 1, page_size: 1000 });
        assert_eq!(ranked.len(), 6);
    }

    #[test]
    fn test_popularity_counts_each_user_once() {
        let pet_id = Uuid::new_v4();
        let mut alice = user("+77010000001");
        alice.liked = vec![pet_id, pet_id];
        let mut bob = user("+77010000002");
        bob.liked = vec![pet_id];

        assert_eq!(popularity(&[alice, bob])[&pet_id], 2);
    }

    #[test]
    fn test_filters_from_query() {
        let filters = PetFilters::from_query(&query(&[
            ("type", "dog"),
            ("sterilized", "TRUE"),
            ("sex", "female"),
            ("weight", "4.5"),
            ("owner_type", "shelter"),
            ("color", "black"),
        ]));
        assert_eq!(
            filters,
            PetFilters {
                pet_type: Some("dog".to_string()),
                sterilized: Some(true),
                sex: Some(Sex::Female),
                weight: Some(4.5),
                owner_type: Some(AccountType::Shelter),
            }
        );

        let malformed = PetFilters::from_query(&query(&[
            ("type", ""),
            ("sterilized", "maybe"),
            ("sex", "other"),
            ("weight", "abc"),
            ("owner_type", "zoo"),
        ]));
        assert_eq!(malformed, PetFilters::default());
    }

    #[test]
    fn test_pagination_from_query() {
        assert_eq!(Pagination::from_query(&query(&[])), Pagination::default());

        for bad in ["0", "-3", "ten", ""] {
            let p = Pagination::from_query(&query(&[("page", bad), ("limit", bad)]));
            assert_eq!(p, Pagination::default(), "value {:?}", bad);
        }

        let p = Pagination::from_query(&query(&[("page", "3"), ("page_size", "25")]));
        assert_eq!(p, Pagination { page: 3, page_size: 25 });
        assert_eq!(p.offset(), 50);

        let p = Pagination::from_query(&query(&[("limit", "5"), ("page_size", "25")]));
        assert_eq!(p.page_size, 5);

        let p = Pagination::from_query(&query(&[("page", "2.5"), ("limit", "5abc")]));
        assert_eq!(p, Pagination { page: 2, page_size: 5 });

        let p = Pagination::from_query(&query(&[("page", " +4"), ("limit", "-0")]));
        assert_eq!(p, Pagination { page: 4, page_size: DEFAULT_PAGE_SIZE });

        let p = Pagination::from_query(&query(&[("page", "99999999999999999999")]));
        assert_eq!(p.page, usize::MAX);

        let huge = Pagination {
            page: usize::MAX,
            page_size: usize::MAX,
        };
        assert_eq!(huge.offset(), usize::MAX);
    }

    #[test]
    fn test_oversized_page_is_empty() {
        let (pets, users) = fixture();
        let pagination = Pagination::from_query(&query(&[("page", "99999999999999999999")]));

        let ranked = rank_pets(pets, &users, &PetFilters::default(), None, pagination);
        assert!(ranked.is_empty());
    }

    #[tokio::test]
    async fn test_recommend_propagates_store_failures() {
        let gate = AuthGate::new(jwt_service(), Arc::new(FailingStore), &[]);

        let result = recommend(
            &FailingStore,
            &FailingStore,
            &gate,
            &PetFilters::default(),
            Pagination::default(),
            None,
        )
        .await;

        assert!(matches!(result, Err(ApiError::Database(_))));
    }

    #[tokio::test]
    async fn test_recommend_degrades_on_bad_credentials() {
        let store = MemoryStore::new();
        let (pets, users) = fixture();
        let owner_id = pets[0].owner_id;
        for p in pets {
            store.insert_pet(p).await;
        }
        for u in users.iter().cloned() {
            store.insert_user(u).await;
        }

        let jwt = jwt_service();
        let gate = AuthGate::new(jwt.clone(), Arc::new(store.clone()), &[]);
        let owner = users.iter().find(|u| u.id == owner_id).unwrap();

        for credential in [None, Some("Bearer garbage"), Some("Basic abc")] {
            let ranked = recommend(
                &store,
                &store,
                &gate,
                &PetFilters::default(),
                Pagination::default(),
                credential,
            )
            .await
            .unwrap();
            assert_eq!(names(&ranked), vec!["B", "A", "C"]);
        }

        // The owner resolves, so their own listings disappear
        let header = bearer(&jwt, owner);
        let ranked = recommend(
            &store,
            &store,
            &gate,
            &PetFilters::default(),
            Pagination::default(),
            Some(&header),
        )
        .await
        .unwrap();
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_recommended_pet_serializes_flat() {
        let owner = user("+77019999999");
        let json = serde_json::to_value(RecommendedPet {
            pet: pet("A", "dog", owner.id),
            likes_count: 2,
        })
        .unwrap();

        assert_eq!(json["name"], "A");
        assert_eq!(json["type"], "dog");
        assert_eq!(json["likes_count"], 2);
    }
}
