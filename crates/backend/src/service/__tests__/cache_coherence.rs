//! Counter cache and root cache behavior as seen through the engine.

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use pretty_assertions::assert_eq;

  use crate::{
    domain::{
      entry::{EntryId, RootScope, UserId},
      tag::Tag,
    },
    engine::MarkerEngine,
    service::{
      __tests__::helpers::{TENANT, TestContext},
      marker::RootCount,
    },
  };

  async fn wait_for_count(engine: &MarkerEngine, user: UserId, root: &EntryId, expected: i64) -> i64 {
    let mut last = -1;
    for _ in 0..100 {
      last = engine.root_unseen_count(TENANT, user, root).await.unwrap();
      if last == expected {
        break;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    last
  }

  #[tokio::test]
  async fn test_root_count_is_served_from_cache_until_a_write() {
    let ctx = TestContext::new().await;
    let (alice, bob) = (UserId::random(), UserId::random());
    let common = ctx.common_root(&[alice, bob]);
    let first = ctx.file(100u64, &common, alice);
    ctx.mark(alice, &first).await;

    assert_eq!(ctx.engine.root_unseen_count(TENANT, bob, &common.id).await.unwrap(), 1);

    // Invisible while cached
    let mut raw = ctx.store.tag(bob, &common.key()).unwrap();
    raw.count = 7;
    ctx.store.put_tag(raw);
    assert_eq!(ctx.engine.root_unseen_count(TENANT, bob, &common.id).await.unwrap(), 1);

    let second = ctx.file(101u64, &common, alice);
    ctx.mark(alice, &second).await;
    assert_eq!(ctx.engine.root_unseen_count(TENANT, bob, &common.id).await.unwrap(), 8);
  }

  #[tokio::test]
  async fn test_seeing_clears_cached_count() {
    let ctx = TestContext::new().await;
    let (alice, bob) = (UserId::random(), UserId::random());
    let common = ctx.common_root(&[alice, bob]);
    let file = ctx.file(100u64, &common, alice);
    ctx.mark(alice, &file).await;
    assert_eq!(ctx.engine.root_unseen_count(TENANT, bob, &common.id).await.unwrap(), 1);

    ctx.see(bob, &file).await;

    assert_eq!(ctx.engine.root_unseen_count(TENANT, bob, &common.id).await.unwrap(), 0);
  }

  #[tokio::test]
  async fn test_writes_in_one_process_reach_the_other() {
    let ctx = TestContext::new().await;
    let reader = ctx.second_process();
    let (alice, bob) = (UserId::random(), UserId::random());
    let common = ctx.common_root(&[alice, bob]);

    assert_eq!(reader.root_unseen_count(TENANT, bob, &common.id).await.unwrap(), 0);

    let file = ctx.file(100u64, &common, alice);
    ctx.mark(alice, &file).await;

    assert_eq!(wait_for_count(&reader, bob, &common.id, 1).await, 1);
    assert!(reader.counters().stats().evictions_received >= 1);
    reader.shutdown().await;
  }

  #[tokio::test]
  async fn test_root_summary_lists_existing_roots() {
    let ctx = TestContext::new().await;
    let (alice, bob) = (UserId::random(), UserId::random());
    let common = ctx.common_root(&[alice, bob]);
    let home = ctx.home(10, bob);
    let shared = ctx.shared_root(20);
    let alice_home = ctx.home(30, alice);
    let outbox = ctx.folder(31u64, &alice_home, alice);
    ctx.store.grant(&outbox.key(), bob);

    for file in [ctx.file(100u64, &common, alice), ctx.file(310u64, &outbox, alice)] {
      ctx.mark(alice, &file).await;
    }

    let summary = ctx.engine.root_summary(TENANT, bob).await.unwrap();

    assert_eq!(
      summary,
      vec![
        RootCount {
          scope: RootScope::UserHome,
          root: home.id.clone(),
          count: 0,
        },
        RootCount {
          scope: RootScope::Common,
          root: common.id.clone(),
          count: 1,
        },
        RootCount {
          scope: RootScope::SharedWithMe,
          root: shared.id.clone(),
          count: 1,
        },
      ]
    );
  }

  #[tokio::test]
  async fn test_invalidate_roots_picks_up_a_new_root() {
    let ctx = TestContext::new().await;
    let bob = UserId::random();
    ctx.common_root(&[bob]);
    let summary = ctx.engine.root_summary(TENANT, bob).await.unwrap();
    assert_eq!(summary[0].root, EntryId::Native(1));

    let replacement = ctx.root(2, RootScope::Common, ctx.admin, None);
    ctx.store.put_tag(Tag::new_mark(bob, replacement.key(), 4));
    let summary = ctx.engine.root_summary(TENANT, bob).await.unwrap();
    assert_eq!(summary[0].root, EntryId::Native(1), "root ids stay cached");

    ctx.engine.invalidate_roots(TENANT);
    let summary = ctx.engine.root_summary(TENANT, bob).await.unwrap();

    assert_eq!(
      summary,
      vec![RootCount {
        scope: RootScope::Common,
        root: replacement.id,
        count: 4,
      }]
    );
  }

  #[tokio::test]
  async fn test_removed_marks_are_pushed_with_zero_count() {
    let ctx = TestContext::new().await;
    let (alice, bob) = (UserId::random(), UserId::random());
    let common = ctx.common_root(&[alice, bob]);
    let file = ctx.file(100u64, &common, alice);
    ctx.mark(alice, &file).await;

    ctx.see(bob, &file).await;
    ctx.settle().await;

    for key in [file.key(), common.key()] {
      let last = ctx.sink.last(bob, &key).expect("pushed");
      assert_eq!(last.count, 0, "{} should be pushed as removed", key);
    }
  }
}
