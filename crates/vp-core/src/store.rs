use crate::ValetError;
use crate::events::EventRepository;
use crate::help::HelpRepository;
use crate::push::PushSubscriptionRepository;
use crate::reports::ReportRepository;

pub trait Store {
    type Help<'a>: HelpRepository
    where
        Self: 'a;
    type Reports<'a>: ReportRepository
    where
        Self: 'a;
    type Push<'a>: PushSubscriptionRepository
    where
        Self: 'a;
    type Events<'a>: EventRepository
    where
        Self: 'a;

    fn help(&self) -> Self::Help<'_>;
    fn reports(&self) -> Self::Reports<'_>;
    fn push(&self) -> Self::Push<'_>;
    fn events(&self) -> Self::Events<'_>;

    fn with_tx<F, T>(&self, f: F) -> Result<T, ValetError>
    where
        F: FnOnce(&Self) -> Result<T, ValetError>;
}
