//! The attribute compiles on every callable shape it accepts and leaves the
//! functions' behaviour intact.

use method_logger_macros::method_logger;

#[method_logger]
fn add(a: i32, b: i32) -> i32 {
    a + b
}

#[method_logger]
fn empty() {}

struct Counter {
    count: u32,
}

impl Counter {
    #[method_logger]
    fn bump(&mut self) -> u32 {
        self.count += 1;
        self.count
    }
}

trait Greeter {
    #[method_logger]
    fn name(&self) -> String;

    #[method_logger]
    fn greet(&self) -> String {
        format!("hi {}", self.name())
    }
}

impl Greeter for Counter {
    fn name(&self) -> String {
        format!("counter#{}", self.count)
    }
}

#[method_logger]
fn outer() -> u32 {
    #[method_logger]
    fn inner() -> u32 {
        41
    }
    inner() + 1
}

#[method_logger_macros::method_logger]
fn qualified_path() -> &'static str {
    "ok"
}

#[test]
fn free_functions_keep_their_results() {
    assert_eq!(add(2, 3), 5);
    empty();
    assert_eq!(qualified_path(), "ok");
}

#[test]
fn methods_keep_their_results() {
    let mut counter = Counter { count: 0 };
    assert_eq!(counter.bump(), 1);
    assert_eq!(counter.bump(), 2);
    assert_eq!(counter.greet(), "hi counter#2");
}

#[test]
fn nested_functions_expand_independently() {
    assert_eq!(outer(), 42);
}
