//! Recycling pool for vector element buffers. Dropping a vector value hands
//! its heap buffer back here instead of freeing it; constructing one draws a
//! warm buffer with its capacity intact, so hot interpreter loops allocate
//! O(1) amortized. Single-threaded by construction (thread-local state).

use std::cell::RefCell;

use log::debug;

use crate::values::{ElementVec, ValueData};

/// Buffers retained per element type; beyond this they are freed normally.
const MAX_FREE_BUFFERS: usize = 256;

#[derive(Default)]
struct BufferPool {
    logical: Vec<Vec<bool>>,
    integer: Vec<Vec<i64>>,
    float: Vec<Vec<f64>>,
    string: Vec<Vec<String>>,
    acquired: u64,
    recycled: u64,
}

impl BufferPool {
    fn take<T>(free: &mut Vec<Vec<T>>, capacity: usize) -> Vec<T> {
        match free.pop() {
            Some(mut buf) => {
                buf.reserve(capacity);
                buf
            }
            None => Vec::with_capacity(capacity),
        }
    }

    fn put<T>(free: &mut Vec<Vec<T>>, mut buf: Vec<T>) {
        if free.len() < MAX_FREE_BUFFERS && buf.capacity() > 0 {
            buf.clear();
            free.push(buf);
        }
    }
}

thread_local! {
    static POOL: RefCell<BufferPool> = RefCell::new(BufferPool::default());
}

pub fn logical_buffer(capacity: usize) -> Vec<bool> {
    POOL.with(|p| {
        let mut p = p.borrow_mut();
        p.acquired += 1;
        BufferPool::take(&mut p.logical, capacity)
    })
}

pub fn integer_buffer(capacity: usize) -> Vec<i64> {
    POOL.with(|p| {
        let mut p = p.borrow_mut();
        p.acquired += 1;
        BufferPool::take(&mut p.integer, capacity)
    })
}

pub fn float_buffer(capacity: usize) -> Vec<f64> {
    POOL.with(|p| {
        let mut p = p.borrow_mut();
        p.acquired += 1;
        BufferPool::take(&mut p.float, capacity)
    })
}

pub fn string_buffer(capacity: usize) -> Vec<String> {
    POOL.with(|p| {
        let mut p = p.borrow_mut();
        p.acquired += 1;
        BufferPool::take(&mut p.string, capacity)
    })
}

/// Release hook invoked when a value is dropped: vector buffers return to the
/// free lists, everything else drops normally.
pub(crate) fn recycle(data: ValueData) {
    match data {
        ValueData::Logical(ElementVec::Vector(buf)) => POOL.with(|p| {
            let mut p = p.borrow_mut();
            p.recycled += 1;
            BufferPool::put(&mut p.logical, buf);
        }),
        ValueData::Integer(ElementVec::Vector(buf)) => POOL.with(|p| {
            let mut p = p.borrow_mut();
            p.recycled += 1;
            BufferPool::put(&mut p.integer, buf);
        }),
        ValueData::Float(ElementVec::Vector(buf)) => POOL.with(|p| {
            let mut p = p.borrow_mut();
            p.recycled += 1;
            BufferPool::put(&mut p.float, buf);
        }),
        ValueData::String(ElementVec::Vector(buf)) => POOL.with(|p| {
            let mut p = p.borrow_mut();
            p.recycled += 1;
            BufferPool::put(&mut p.string, buf);
        }),
        _ => {}
    }
}

/// (buffers handed out, buffers taken back) since warmup.
pub fn stats() -> (u64, u64) {
    POOL.with(|p| {
        let p = p.borrow();
        (p.acquired, p.recycled)
    })
}

pub fn warmup() {
    POOL.with(|_| {});
    debug!(
        "value pool ready ({} free buffers retained max per type)",
        MAX_FREE_BUFFERS
    );
}

/// Frees all retained buffers and logs churn statistics.
pub fn teardown() {
    POOL.with(|p| {
        let mut p = p.borrow_mut();
        debug!(
            "value pool teardown: {} buffers acquired, {} recycled",
            p.acquired, p.recycled
        );
        p.logical.clear();
        p.integer.clear();
        p.float.clear();
        p.string.clear();
    });
}
