/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Cooperative round-robin scheduling of EL0 programs loaded from the
//! initramfs.
//!
//! There is no timer-IRQ preemption (see [`timer`]), so a thread runs
//! uninterrupted until it exits or forks; `kernel_exec` drains the run
//! queue before returning, so from the shell's point of view `exec` blocks
//! until the whole process tree it started has exited. Real preemptive
//! multitasking would need the platform's timer IRQ wired up, which this
//! board support doesn't do yet.

pub mod context;
pub mod thread;
pub mod timer;

use {
    crate::{
        boot::{cpio, dtb},
        trap::TrapFrame,
        KernelError, Result,
    },
    alloc::{boxed::Box, collections::VecDeque, vec::Vec},
    context::CpuContext,
    core::cell::UnsafeCell,
    machine::exception::asynchronous::exec_with_irq_masked,
    thread::{State, Thread, Tid, STACK_SIZE},
};

struct Scheduler {
    threads: Vec<Box<Thread>>,
    run_queue: VecDeque<Tid>,
    current: Option<Tid>,
    next_tid: u64,
    /// Tids returned by the reaper, handed back out by `alloc_tid` before
    /// minting a new one.
    free_tids: Vec<u64>,
    /// Where control returns once the run queue drains: whichever kernel
    /// context originally called into the scheduler (the shell, so far).
    idle_ctx: CpuContext,
}

struct SchedulerCell(UnsafeCell<Scheduler>);

// Single core; all access goes through `with_sched`, which masks IRQs.
unsafe impl Sync for SchedulerCell {}

static SCHED: SchedulerCell = SchedulerCell(UnsafeCell::new(Scheduler {
    threads: Vec::new(),
    run_queue: VecDeque::new(),
    current: None,
    next_tid: 1,
    free_tids: Vec::new(),
    idle_ctx: CpuContext::new(0, 0),
}));

fn with_sched<R>(f: impl FnOnce(&mut Scheduler) -> R) -> R {
    exec_with_irq_masked(|| f(unsafe { &mut *SCHED.0.get() }))
}

impl Scheduler {
    fn index_of(&self, tid: Tid) -> usize {
        self.threads
            .iter()
            .position(|t| t.id == tid)
            .expect("thread table referenced an unknown tid")
    }

    fn thread(&self, tid: Tid) -> &Thread {
        &self.threads[self.index_of(tid)]
    }

    fn thread_mut(&mut self, tid: Tid) -> &mut Thread {
        let idx = self.index_of(tid);
        &mut self.threads[idx]
    }

    /// Recycles a tid freed by [`reap_exited`](Self::reap_exited) if one is
    /// available, otherwise mints a fresh one.
    fn alloc_tid(&mut self) -> Tid {
        match self.free_tids.pop() {
            Some(raw) => Tid(raw),
            None => {
                let tid = Tid(self.next_tid);
                self.next_tid += 1;
                tid
            }
        }
    }

    /// Drops threads that have run to completion and are no longer
    /// referenced by `current` or the run queue, returning their code pages
    /// and both stacks, and recycling their tid for [`alloc_tid`].
    fn reap_exited(&mut self) {
        let current = self.current;
        let mut i = 0;
        while i < self.threads.len() {
            let reapable = self.threads[i].state == State::Exited && Some(self.threads[i].id) != current;
            if reapable {
                let dead = self.threads.remove(i);
                self.free_tids.push(dead.id.raw());
            } else {
                i += 1;
            }
        }
    }
}

/// Builds a fresh thread around a just-loaded program image, ready to run
/// from its entry point on a brand new user and kernel stack.
fn spawn(code: Box<[u8]>) -> Thread {
    let ustack = thread::new_stack(STACK_SIZE);
    let kstack = thread::new_stack(STACK_SIZE);

    let entry = code.as_ptr() as u64;
    let user_sp = ustack.as_ptr() as u64 + ustack.len() as u64;
    let frame = TrapFrame::for_entry(entry, user_sp);

    let kstack_top = kstack.as_ptr() as u64 + kstack.len() as u64;
    let frame_addr = kstack_top - core::mem::size_of::<TrapFrame>() as u64;
    unsafe { core::ptr::write(frame_addr as *mut TrapFrame, frame) };

    Thread {
        id: Tid(0), // assigned by the caller, which owns `next_tid`
        state: State::Ready,
        ctx: CpuContext::new(frame_addr, ret_from_fork_addr()),
        code,
        ustack,
        kstack,
    }
}

fn ret_from_fork_addr() -> u64 {
    crate::trap::ret_from_fork as u64
}

/// Loads `path` out of the initramfs and starts it as a new thread.
///
/// Returns as soon as the whole run queue (this thread and anything it
/// forks) has drained back to idle; see the module docs for why.
pub fn kernel_exec(path: &str) -> Result<Tid> {
    let (start, end) = dtb::initrd_range().ok_or(KernelError::NotFound)?;
    let archive = unsafe { core::slice::from_raw_parts(start as *const u8, end - start) };
    let data = cpio::find_file(archive, path).ok_or(KernelError::NotFound)?;

    let code: Box<[u8]> = data.into();
    let tid = with_sched(|s| {
        let mut thread = spawn(code);
        let tid = s.alloc_tid();
        thread.id = tid;
        s.threads.push(Box::new(thread));
        s.run_queue.push_back(tid);
        tid
    });

    run_until_idle();
    Ok(tid)
}

/// Duplicates the currently running thread: a fresh code/user-stack copy,
/// a trap frame cloned from the parent's (with `x0` zeroed for the child
/// and `elr_el1`/`sp_el0` carried over relative to each thread's own code
/// and stack base), scheduled to run once the parent yields.
///
/// Returns the child's tid to the parent; the child observes a `0` through
/// its own cloned trap frame (set by the caller, see `trap::syscall`).
pub fn do_fork(parent_frame: &TrapFrame) -> Result<Tid> {
    let child_tid = with_sched(|s| -> Result<Tid> {
        let parent_tid = s.current.ok_or(KernelError::InvalidArgument)?;
        let parent = s.thread(parent_tid);

        let code = parent.code.to_vec().into_boxed_slice();

        let mut ustack = thread::new_stack(STACK_SIZE);
        ustack.copy_from_slice(&parent.ustack);
        let kstack = thread::new_stack(STACK_SIZE);

        let code_off = (code.as_ptr() as u64).wrapping_sub(parent.code_base());
        let ustack_off = (ustack.as_ptr() as u64).wrapping_sub(parent.ustack_base());

        let mut child_frame = *parent_frame;
        child_frame.x[0] = 0;
        child_frame.elr_el1 = child_frame.elr_el1.wrapping_add(code_off);
        child_frame.sp_el0 = child_frame.sp_el0.wrapping_add(ustack_off);

        let kstack_top = kstack.as_ptr() as u64 + kstack.len() as u64;
        let frame_addr = kstack_top - core::mem::size_of::<TrapFrame>() as u64;
        unsafe { core::ptr::write(frame_addr as *mut TrapFrame, child_frame) };

        let tid = s.alloc_tid();
        let child = Thread {
            id: tid,
            state: State::Ready,
            ctx: CpuContext::new(frame_addr, ret_from_fork_addr()),
            code,
            ustack,
            kstack,
        };

        s.threads.push(Box::new(child));
        s.run_queue.push_back(tid);
        Ok(tid)
    })?;

    Ok(child_tid)
}

/// Replaces the currently running thread's program image in place, the way
/// `exec` always has: same thread, same tid, new code and a reset user
/// stack. Returns the entry/sp pair the caller should write into its own
/// trap frame before returning to EL0.
pub fn do_exec(path: &str) -> Result<(u64, u64)> {
    let (start, end) = dtb::initrd_range().ok_or(KernelError::NotFound)?;
    let archive = unsafe { core::slice::from_raw_parts(start as *const u8, end - start) };
    let data = cpio::find_file(archive, path).ok_or(KernelError::NotFound)?;
    let code: Box<[u8]> = data.into();

    with_sched(|s| {
        let tid = s.current.ok_or(KernelError::InvalidArgument)?;
        let entry = code.as_ptr() as u64;
        let thread = s.thread_mut(tid);
        thread.code = code;
        let user_sp = thread.ustack_top();
        Ok((entry, user_sp))
    })
}

/// Marks the currently running thread exited and switches to whatever
/// should run next. Never returns.
pub fn do_exit() -> ! {
    let prev_tid = with_sched(|s| {
        let tid = s.current.take().expect("exit with no thread running");
        s.thread_mut(tid).state = State::Exited;
        tid
    });

    reschedule_from(prev_tid);
    unreachable!("an exited thread was resumed")
}

/// Gives up the remainder of the current thread's slice without exiting,
/// in case future syscalls need cooperative yielding.
#[allow(dead_code)]
pub fn yield_now() {
    let prev_tid = match with_sched(|s| s.current) {
        Some(tid) => tid,
        None => return,
    };
    with_sched(|s| {
        s.thread_mut(prev_tid).state = State::Ready;
        s.run_queue.push_back(prev_tid);
    });
    reschedule_from(prev_tid);
}

/// Returns the tid of whatever thread is currently loaded, if any.
pub fn current() -> Option<Tid> {
    with_sched(|s| s.current)
}

fn run_until_idle() {
    loop {
        timer::tick();
        let next = with_sched(|s| {
            s.reap_exited();
            s.run_queue.pop_front()
        });
        match next {
            Some(tid) => switch_into(tid),
            None => break,
        }
    }
}

fn switch_into(tid: Tid) {
    with_sched(|s| {
        s.current = Some(tid);
        s.thread_mut(tid).state = State::Running;
    });
    let idle_ctx: *mut CpuContext = with_sched(|s| &mut s.idle_ctx as *mut CpuContext);
    let next_ctx: *const CpuContext = with_sched(|s| &s.thread(tid).ctx as *const CpuContext);
    unsafe { context::switch(idle_ctx, next_ctx) };
}

/// Switches away from `prev_tid` to the next ready thread, or back to idle
/// if none is ready.
///
/// Deliberately does not reap `prev_tid` even if it just exited: this
/// function runs on `prev_tid`'s own kernel stack right up until the
/// `switch` call below, so freeing its `Thread` (and the stack memory it
/// owns) here would pull the rug out from under the very code running it.
/// Exited threads are reaped later, from [`run_until_idle`], which only
/// ever runs on the idle context's own stack.
fn reschedule_from(prev_tid: Tid) -> ! {
    let next = with_sched(|s| s.run_queue.pop_front());

    match next {
        Some(tid) => {
            with_sched(|s| {
                s.current = Some(tid);
                s.thread_mut(tid).state = State::Running;
            });
            let prev_ctx: *mut CpuContext = with_sched(|s| &mut s.thread_mut(prev_tid).ctx as *mut CpuContext);
            let next_ctx: *const CpuContext = with_sched(|s| &s.thread(tid).ctx as *const CpuContext);
            unsafe { context::switch(prev_ctx, next_ctx) };
        }
        None => {
            with_sched(|s| s.current = None);
            let prev_ctx: *mut CpuContext = with_sched(|s| &mut s.thread_mut(prev_tid).ctx as *mut CpuContext);
            let idle_ctx: *const CpuContext = with_sched(|s| &s.idle_ctx as *const CpuContext);
            unsafe { context::switch(prev_ctx, idle_ctx) };
        }
    }

    // Only reached if `prev_tid` is ever resumed, which an exited thread
    // never is; kept for thread states this function may grow to support
    // (blocking reads, sleeps) without becoming `unsafe` to call.
    loop {
        machine::cpu::endless_sleep();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn tid_allocation_is_monotonic_and_unique() {
        with_sched(|s| {
            let a = s.alloc_tid();
            let b = s.alloc_tid();
            assert!(b.0 > a.0);
        });
    }

    fn dummy_thread(id: Tid, state: State) -> Box<Thread> {
        Box::new(Thread {
            id,
            state,
            ctx: CpuContext::new(0, 0),
            code: alloc::vec![].into_boxed_slice(),
            ustack: alloc::vec![].into_boxed_slice(),
            kstack: alloc::vec![].into_boxed_slice(),
        })
    }

    #[test_case]
    fn reap_exited_recycles_the_tid() {
        with_sched(|s| {
            let tid = s.alloc_tid();
            s.threads.push(dummy_thread(tid, State::Exited));
            s.current = None;

            s.reap_exited();
            assert!(s.threads.is_empty());

            let recycled = s.alloc_tid();
            assert_eq!(recycled, tid);
        });
    }

    #[test_case]
    fn reap_exited_does_not_recycle_the_current_thread() {
        with_sched(|s| {
            let tid = s.alloc_tid();
            s.threads.push(dummy_thread(tid, State::Exited));
            s.current = Some(tid);

            s.reap_exited();
            assert_eq!(s.threads.len(), 1);

            let next = s.alloc_tid();
            assert_ne!(next, tid);

            // clean up for any tests that run after this one
            s.threads.clear();
            s.current = None;
        });
    }
}
