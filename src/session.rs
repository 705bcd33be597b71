pub const USERNAME: &str = "username";
