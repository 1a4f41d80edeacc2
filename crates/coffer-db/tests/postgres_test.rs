mod helpers;

use coffer_core::models::{FileQuery, NewFile, NewUser, QuotaLimits, SortField, SortOrder};
use coffer_core::{AppError, QuotaViolation};
use coffer_db::{FileRepository, PgFileRepository, PgUserRepository, UserRepository};
use helpers::setup_test_db;

fn new_file(user_id: i64, name: &str, folder: &str, size: i64) -> NewFile {
    NewFile {
        user_id,
        filename: format!("{}.txt", name),
        original_name: name.to_string(),
        file_path: format!("/data/{}/{}.txt", user_id, name),
        folder_path: folder.to_string(),
        file_size: size,
        mime_type: "text/plain".to_string(),
    }
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_conditional_insert_enforces_limits() {
    let db = setup_test_db().await;
    let users = PgUserRepository::new(db.pool.clone());
    let files = PgFileRepository::new(db.pool.clone());

    let user = users.create(NewUser::new("ada", "ada@example.com")).await.unwrap();
    let limits = QuotaLimits {
        max_files: 2,
        max_file_size: 100,
        max_storage: 150,
    };

    files.create_within_quota(new_file(user.id, "a", "", 60), limits).await.unwrap();
    let err = files
        .create_within_quota(new_file(user.id, "b", "", 100), limits)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::QuotaExceeded(QuotaViolation::Storage { .. })));

    files.create_within_quota(new_file(user.id, "c", "", 40), limits).await.unwrap();
    let err = files
        .create_within_quota(new_file(user.id, "d", "", 1), limits)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::QuotaExceeded(QuotaViolation::FileCount { .. })));

    assert_eq!(files.count_by_user(user.id).await.unwrap(), 2);
    assert_eq!(files.total_size_by_user(user.id).await.unwrap(), 100);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_concurrent_inserts_respect_file_limit() {
    let db = setup_test_db().await;
    let users = PgUserRepository::new(db.pool.clone());
    let files = PgFileRepository::new(db.pool.clone());

    let user = users.create(NewUser::new("bob", "bob@example.com")).await.unwrap();
    let limits = QuotaLimits {
        max_files: 3,
        ..QuotaLimits::default()
    };

    let mut handles = Vec::new();
    for i in 0..10 {
        let files = files.clone();
        let user_id = user.id;
        handles.push(tokio::spawn(async move {
            files
                .create_within_quota(new_file(user_id, &format!("f{}", i), "", 1), limits)
                .await
        }));
    }
    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 3);
    assert_eq!(files.count_by_user(user.id).await.unwrap(), 3);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_folder_rename_and_delete_match_whole_segments() {
    let db = setup_test_db().await;
    let users = PgUserRepository::new(db.pool.clone());
    let files = PgFileRepository::new(db.pool.clone());

    let user = users.create(NewUser::new("cy", "cy@example.com")).await.unwrap();
    let limits = QuotaLimits::default();
    for (name, folder) in [("1", "a"), ("2", "a/b"), ("3", "ab"), ("4", "")] {
        files
            .create_within_quota(new_file(user.id, name, folder, 1), limits)
            .await
            .unwrap();
    }

    assert_eq!(files.count_in_folder(user.id, "a").await.unwrap(), 2);

    let touched = files.rename_folder(user.id, "a", "z").await.unwrap();
    assert_eq!(touched, 2);
    assert_eq!(
        files.distinct_folder_paths(user.id).await.unwrap(),
        vec!["ab", "z", "z/b"]
    );

    let removed = files.delete_folder(user.id, "z").await.unwrap();
    assert_eq!(removed.len(), 2);
    assert_eq!(files.distinct_folder_paths(user.id).await.unwrap(), vec!["ab"]);
    assert_eq!(files.count_by_user(user.id).await.unwrap(), 2);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_list_sorts_and_filters() {
    let db = setup_test_db().await;
    let users = PgUserRepository::new(db.pool.clone());
    let files = PgFileRepository::new(db.pool.clone());

    let user = users.create(NewUser::new("dee", "dee@example.com")).await.unwrap();
    let limits = QuotaLimits::default();
    for (name, size) in [("b", 20), ("a", 30), ("c", 10)] {
        files
            .create_within_quota(new_file(user.id, name, "docs", size), limits)
            .await
            .unwrap();
    }
    files
        .create_within_quota(new_file(user.id, "root", "", 5), limits)
        .await
        .unwrap();

    let query = FileQuery {
        folder_path: Some("docs".to_string()),
        page: 1,
        page_size: 2,
        sort_by: SortField::Size,
        sort_order: SortOrder::Asc,
    };
    let (page, total) = files.list(user.id, &query).await.unwrap();
    assert_eq!(total, 3);
    let names: Vec<&str> = page.iter().map(|f| f.original_name.as_str()).collect();
    assert_eq!(names, vec!["c", "b"]);

    let (all, total) = files.list(user.id, &FileQuery::default().normalized()).await.unwrap();
    assert_eq!(total, 4);
    assert_eq!(all.len(), 4);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_users_unique_and_limits_update() {
    let db = setup_test_db().await;
    let users = PgUserRepository::new(db.pool.clone());

    let user = users.create(NewUser::new("eve", "eve@example.com")).await.unwrap();
    let err = users
        .create(NewUser::new("eve", "other@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let limits = QuotaLimits {
        max_files: 7,
        max_file_size: 70,
        max_storage: 700,
    };
    let updated = users.update_limits(user.id, limits).await.unwrap();
    assert_eq!(updated.limits(), limits);

    let missing = users.update_limits(9_999, limits).await.unwrap_err();
    assert!(matches!(missing, AppError::NotFound(_)));
}
