//! Async task bookkeeping.
//!
//! Every collaborator call is issued under a fresh `TaskId`. The reducer marks
//! the id active when it emits the effect; a completion is only applied if its
//! id is still the active one for its kind. Anything else is a late result
//! from a superseded attempt and gets dropped.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

#[derive(Debug, Default)]
pub struct TaskSeq {
    next: u64,
}

impl TaskSeq {
    pub fn next_id(&mut self) -> TaskId {
        let id = TaskId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    DeviceUnlock,
    ManagementCheck,
    Signin,
    CredentialRefresh,
    AddAccount,
}

#[derive(Debug)]
pub struct TaskCompleted<E> {
    pub id: TaskId,
    pub result: E,
}

/// Task lifecycle state (stored in `SheetState`, mutated only by the reducer).
#[derive(Debug, Default, Clone)]
pub struct TaskState {
    pub active: Option<TaskId>,
}

impl TaskState {
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn start(&mut self, id: TaskId) {
        self.active = Some(id);
    }

    pub fn finish_if_active(&mut self, id: TaskId) -> bool {
        let ok = self.active == Some(id);
        if ok {
            self.active = None;
        }
        ok
    }

    pub fn clear(&mut self) {
        self.active = None;
    }
}

#[derive(Debug, Default, Clone)]
pub struct Tasks {
    pub device_unlock: TaskState,
    pub management_check: TaskState,
    pub signin: TaskState,
    pub credential_refresh: TaskState,
    pub add_account: TaskState,
}

impl Tasks {
    pub fn state(&self, kind: TaskKind) -> &TaskState {
        match kind {
            TaskKind::DeviceUnlock => &self.device_unlock,
            TaskKind::ManagementCheck => &self.management_check,
            TaskKind::Signin => &self.signin,
            TaskKind::CredentialRefresh => &self.credential_refresh,
            TaskKind::AddAccount => &self.add_account,
        }
    }

    pub fn state_mut(&mut self, kind: TaskKind) -> &mut TaskState {
        match kind {
            TaskKind::DeviceUnlock => &mut self.device_unlock,
            TaskKind::ManagementCheck => &mut self.management_check,
            TaskKind::Signin => &mut self.signin,
            TaskKind::CredentialRefresh => &mut self.credential_refresh,
            TaskKind::AddAccount => &mut self.add_account,
        }
    }

    pub fn is_any_running(&self) -> bool {
        self.device_unlock.is_running()
            || self.management_check.is_running()
            || self.signin.is_running()
            || self.credential_refresh.is_running()
            || self.add_account.is_running()
    }
}
