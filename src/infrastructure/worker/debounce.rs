//! Debounce Timer - 单槽延迟任务
//!
//! 每次 `arm` 取消上一次尚未触发的回调，只有最后一次生效

use parking_lot::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// 防抖定时器
///
/// 回调在构造时捕获的 tokio 运行时上执行，所以 `arm` 可以在同步代码里调用。
/// 定时器被 drop 时未触发的回调一并取消
pub struct DebounceTimer {
    runtime: Handle,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl DebounceTimer {
    /// 使用当前运行时创建
    ///
    /// 必须在 tokio 运行时上下文中调用
    pub fn new() -> Self {
        Self::with_handle(Handle::current())
    }

    pub fn with_handle(runtime: Handle) -> Self {
        Self {
            runtime,
            pending: Mutex::new(None),
        }
    }

    /// 在 `delay` 之后执行 `on_fire`，替换之前的计划
    pub fn arm<F>(&self, delay: Duration, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire();
        }));
    }

    /// 取消尚未触发的回调，返回是否真的取消了一个
    pub fn cancel(&self) -> bool {
        match self.pending.lock().take() {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }

    /// 是否有尚未触发的回调
    pub fn is_armed(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Box<dyn FnOnce() + Send>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let make = move || {
            let fired = fired_clone.clone();
            Box::new(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            }) as Box<dyn FnOnce() + Send>
        };
        (fired, make)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let timer = DebounceTimer::new();
        let (fired, make) = counter();

        timer.arm(Duration::from_secs(15), make());
        assert!(timer.is_armed());

        tokio::time::sleep(Duration::from_secs(14)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_coalesces() {
        let timer = DebounceTimer::new();
        let (fired, make) = counter();

        for _ in 0..5 {
            timer.arm(Duration::from_secs(10), make());
            tokio::time::sleep(Duration::from_secs(3)).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        let timer = DebounceTimer::new();
        let (fired, make) = counter();

        timer.arm(Duration::from_secs(10), make());
        assert!(timer.cancel());
        assert!(!timer.cancel());

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending() {
        let (fired, make) = counter();
        {
            let timer = DebounceTimer::new();
            timer.arm(Duration::from_secs(10), make());
        }

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
