pub mod activities;
pub mod activity_fields;
pub mod calendar;
pub mod complaints;
pub mod dashboard;
pub mod feedbacks;
pub mod frequencies;
pub mod geography;
pub mod health;
pub mod lookups;
pub mod media;
pub mod notifications;
pub mod reports;
pub mod schedules;
pub mod submissions;
pub mod tehsil_activities;
pub mod unscheduled;
pub mod users;
