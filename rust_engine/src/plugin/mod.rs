//! 宿主插件边界
//!
//! 把外部加载器产出的网格、骨骼转换为控制器输入，每次调用跑完整流水线。
//! `init()` 与 `shutdown()` 之间才允许调用 `go()`。

mod abs;
mod interface;

pub use abs::{AbsBone, AbsMesh, AbsSkeleton};
pub use interface::PluginInterface;

use once_cell::sync::Lazy;
use std::sync::{PoisonError, RwLock};

/// 进程级生命周期标志
static PLUGIN_STATE: Lazy<RwLock<bool>> = Lazy::new(|| RwLock::new(false));

/// 开启插件窗口
pub fn init() {
    let mut state = PLUGIN_STATE.write().unwrap_or_else(PoisonError::into_inner);
    if *state {
        log::warn!("插件接口重复初始化");
        return;
    }
    *state = true;
    log::info!("插件接口已初始化");
}

/// 关闭插件窗口，之后的 go() 调用返回 NotInitialized
pub fn shutdown() {
    let mut state = PLUGIN_STATE.write().unwrap_or_else(PoisonError::into_inner);
    if !*state {
        log::warn!("插件接口未初始化，忽略 shutdown");
        return;
    }
    *state = false;
    log::info!("插件接口已关闭");
}

pub fn is_initialized() -> bool {
    *PLUGIN_STATE.read().unwrap_or_else(PoisonError::into_inner)
}

/// 串行化修改全局生命周期的测试
#[cfg(test)]
static LIFECYCLE_TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
fn lifecycle_guard() -> std::sync::MutexGuard<'static, ()> {
    LIFECYCLE_TEST_LOCK
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}
