//! Demonstrates basic use of `Shared` and `Weak` handles.
//!
//! This example shows how shared ownership, weak observation and the two-stage
//! release (object first, bookkeeping second) behave in practice.

use counted::Shared;

fn main() {
    demonstrate_shared_ownership();
    println!();
    demonstrate_weak_observation();
}

/// Several handles jointly keep a value alive; it dies with the last one.
fn demonstrate_shared_ownership() {
    println!("Example 1: Shared ownership");
    println!("---------------------------");

    let first = Shared::new("jointly owned".to_string());
    println!("Created a value, strong count: {}", first.strong_count());

    let second = first.clone();
    let third = second.clone();
    println!("After two clones, strong count: {}", first.strong_count());

    drop(first);
    drop(second);
    println!(
        "After dropping two handles, the value is still here: \"{}\" (strong count {})",
        *third,
        third.strong_count()
    );
}

/// Observers track the value's lifecycle without extending it.
fn demonstrate_weak_observation() {
    println!("Example 2: Weak observation");
    println!("---------------------------");

    let owner = Shared::new(vec![1, 2, 3]);
    let observer = owner.downgrade();

    println!(
        "Observer created; expired: {}, weak count: {}",
        observer.expired(),
        owner.weak_count()
    );

    if let Some(upgraded) = observer.upgrade() {
        println!("Upgrade succeeded, the value has {} elements", upgraded.len());
    }

    drop(owner);

    println!(
        "Owner dropped; expired: {}, upgrade yields a handle: {}",
        observer.expired(),
        observer.upgrade().is_some()
    );
}
