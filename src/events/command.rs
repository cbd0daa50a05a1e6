/// Text commands a user can issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Optionally carries a link token.
    Start(Option<String>),
    ShowProfile,
    ListUnread,
    /// Optionally carries a filter: `male`, `female` or `random`.
    BeginMatching(Option<String>),
    EndChat,
    ListAllUsers,
    CreateTestUser(Vec<String>),
    DumpProfile,
}

impl Command {
    pub fn parse(name: &str, mut args: Vec<String>) -> Option<Command> {
        let first = |args: &mut Vec<String>| (!args.is_empty()).then(|| args.remove(0));

        let command = match name.trim().trim_start_matches('/') {
            "start" => Command::Start(first(&mut args)),
            "show_profile" | "info" => Command::ShowProfile,
            "list_unread" => Command::ListUnread,
            "begin_matching" => Command::BeginMatching(first(&mut args)),
            "end_chat" => Command::EndChat,
            "list_all_users" | "list_users" => Command::ListAllUsers,
            "create_test_user" | "add_test_user" => Command::CreateTestUser(args),
            "dump_profile" | "debug_info" => Command::DumpProfile,
            _ => return None,
        };
        Some(command)
    }
}
