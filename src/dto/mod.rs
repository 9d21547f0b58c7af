pub mod quick_apply_dto;
