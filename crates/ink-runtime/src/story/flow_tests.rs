use super::test_support::*;
use super::*;

const TUNNEL: &str = r##"{"inkVersion":17,"root":[["^Start","\n",{"->t->":"tun"},"^Back","\n","end",null],"done",{"tun":["^Inside","\n","->->",{"#f":1}]}]}"##;

const THREADS: &str = r##"{"inkVersion":17,"root":[["thread",{"->":"side"},"ev","str","^Main","/str","/ev",{"*":"0.c-0","flg":20},"done",{"c-0":["^Main chosen","\n","end",{"#f":5}]}],"done",{"side":["ev","str","^Side","/str","/ev",{"*":".^.c-0","flg":20},"done",{"c-0":["^Side chosen","\n","end",{"#f":5}],"#f":1}]}]}"##;

const COUNT_AT_START: &str = r##"{"inkVersion":17,"root":[[{"->":"knot.1"},null],"done",{"knot":["^a","^b","\n",{"->":"back"},{"#f":5}],"back":["^back","\n","end",{"#f":1}]}]}"##;

#[test]
fn tunnels_return_to_caller() {
    let mut story = story(TUNNEL);
    assert_eq!(lines(&mut story), vec!["Start\n", "Inside\n", "Back\n"]);
    assert!(!story.has_error());
}

#[test]
fn tunnel_return_at_top_level_is_an_error() {
    let json = r##"{"inkVersion":17,"root":[["^Hi","\n","->->",null],"done",null]}"##;
    let mut story = story(json);
    assert_eq!(story.continue_story().expect("line"), "Hi\n");
    assert_eq!(error_codes(&story), vec!["RUNTIME_POP_MISMATCH"]);
    let error = &story.current_errors()[0];
    assert!(error
        .message
        .contains("Found tunnel onwards statement (->->), when expected end of flow"));
    assert!(error.location.is_some());
    assert!(!story.can_continue());
}

#[test]
fn tunnel_return_inside_function_keeps_frame() {
    let json = r##"{"inkVersion":17,"root":[["ev",{"f()":"fn"},"pop","/ev","^x","\n","end",null],"done",{"fn":["->->",{"#f":1}]}]}"##;
    let mut story = story(json);
    assert_eq!(story.continue_story().expect("continue"), "");
    assert_eq!(error_codes(&story), vec!["RUNTIME_POP_MISMATCH"]);
    assert_eq!(story.state().call_stack().depth(), 2);
}

#[test]
fn functions_take_arguments_and_return() {
    let mut story = story(DOUBLE);
    assert_eq!(lines(&mut story), vec!["42\n"]);
    assert_eq!(story.state().call_stack().depth(), 1);
    assert!(story.state().evaluation_stack().is_empty());
}

#[test]
fn threads_gather_choices_from_every_branch() {
    let mut story = story(THREADS);
    assert_eq!(lines(&mut story), vec![""]);
    assert_eq!(choice_texts(&story), vec!["Side", "Main"]);

    story.choose_choice_index(0).expect("side choice");
    assert_eq!(lines(&mut story), vec!["Side chosen\n"]);

    let mut story = super::test_support::story(THREADS);
    lines(&mut story);
    story.choose_choice_index(1).expect("main choice");
    assert_eq!(lines(&mut story), vec!["Main chosen\n"]);
    assert!(!story.has_error());
}

#[test]
fn thread_choices_survive_save_and_load() {
    let mut story = story(THREADS);
    lines(&mut story);
    let saved = story.to_json().expect("save should pass");

    let mut resumed = super::test_support::story(THREADS);
    resumed.load_json(&saved).expect("load should pass");
    assert_eq!(choice_texts(&resumed), vec!["Side", "Main"]);
    resumed.choose_choice_index(0).expect("side choice");
    assert_eq!(lines(&mut resumed), vec!["Side chosen\n"]);
}

#[test]
fn thread_choices_keep_their_own_temporaries() {
    let json = r##"{"inkVersion":17,"root":[["ev",1,"/ev",{"temp=":"t"},"thread",{"->":"side"},"ev","str","^Main","/str","/ev",{"*":"0.c-0","flg":20},"done",{"c-0":["ev",{"VAR?":"t"},"out","/ev","\n","end",{"#f":5}]}],"done",{"side":["ev",2,"/ev",{"temp=":"t"},"ev","str","^Side","/str","/ev",{"*":".^.c-0","flg":20},"done",{"c-0":["ev",{"VAR?":"t"},"out","/ev","\n","end",{"#f":5}],"#f":1}]}]}"##;
    let mut story = story(json);
    lines(&mut story);
    assert_eq!(choice_texts(&story), vec!["Side", "Main"]);
    story.choose_choice_index(0).expect("side choice");
    assert_eq!(lines(&mut story), vec!["2\n"]);

    let mut story = super::test_support::story(json);
    lines(&mut story);
    story.choose_choice_index(1).expect("main choice");
    assert_eq!(lines(&mut story), vec!["1\n"]);
    assert!(!story.has_error());
}

#[test]
fn repeated_entries_are_all_counted() {
    let json = r##"{"inkVersion":17,"root":[[{"->t->":"tun"},{"->t->":"tun"},{"->t->":"tun"},"ev",{"CNT?":"tun"},"out","/ev","\n","end",null],"done",{"tun":["^x","\n","->->",{"#f":1}]}]}"##;
    let mut story = story(json);
    assert_eq!(lines(&mut story), vec!["x\n", "x\n", "x\n", "3\n"]);
    assert_eq!(story.visit_count_at_path_string("tun"), 3);
}

#[test]
fn containers_counting_at_start_skip_mid_entry() {
    let mut story = story(COUNT_AT_START);
    assert_eq!(story.continue_story().expect("first line"), "b\n");
    assert_eq!(story.visit_count_at_path_string("knot"), 0);
    assert_eq!(story.visit_count_at_path_string("back"), 0);
    assert_eq!(story.continue_story().expect("second line"), "back\n");
    assert_eq!(story.visit_count_at_path_string("back"), 1);

    story
        .choose_path_string("knot", false, &[])
        .expect("knot exists");
    assert_eq!(
        story.continue_maximally().expect("continue should pass"),
        "ab\nback\n"
    );
    assert_eq!(story.visit_count_at_path_string("knot"), 1);
    assert_eq!(story.visit_count_at_path_string("back"), 2);
}

#[test]
fn choose_path_string_passes_arguments() {
    let json = r##"{"inkVersion":17,"root":[["done",null],"done",{"greet":[{"temp=":"n"},"ev",{"VAR?":"n"},"out","/ev","\n","end",{"#f":1}]}]}"##;
    let mut story = story(json);
    lines(&mut story);
    story
        .choose_path_string("greet", true, &[Value::Int(3)])
        .expect("greet exists");
    assert_eq!(lines(&mut story), vec!["3\n"]);
}

#[test]
fn random_is_seeded_and_replayable() {
    let json = r##"{"inkVersion":17,"root":[["ev",1,100,"rnd","out","/ev","\n","ev",1,100,"rnd","out","/ev","\n","end",null],"done",null]}"##;
    let mut first = story_with_seed(json, 7);
    let mut second = story_with_seed(json, 7);
    let drawn = lines(&mut first);
    assert_eq!(drawn, lines(&mut second));
    assert_eq!(drawn, vec!["50\n", "93\n"]);

    let mut resumed = story_with_seed(json, 7);
    resumed.continue_story().expect("first draw");
    let saved = resumed.to_json().expect("save should pass");
    let mut loaded = story_with_seed(json, 99);
    loaded.load_json(&saved).expect("load should pass");
    assert_eq!(lines(&mut loaded), vec!["93\n"]);
}

#[test]
fn random_rejects_inverted_range() {
    let json = r##"{"inkVersion":17,"root":[["ev",5,1,"rnd","out","/ev","\n","end",null],"done",null]}"##;
    let mut story = story(json);
    story.continue_story().expect("continue");
    assert_eq!(error_codes(&story), vec!["RUNTIME_RANDOM_RANGE"]);
}

#[test]
fn shuffle_visits_each_element_once_per_loop() {
    let json = r##"{"inkVersion":17,"root":[["ev",0,3,"seq","out","/ev","\n","ev",1,3,"seq","out","/ev","\n","ev",2,3,"seq","out","/ev","\n","end",null],"done",null]}"##;
    let mut story = story(json);
    let mut picked = lines(&mut story)
        .iter()
        .map(|line| line.trim().parse::<i32>().expect("index"))
        .collect::<Vec<_>>();
    picked.sort_unstable();
    assert_eq!(picked, vec![0, 1, 2]);
}

#[test]
fn list_arithmetic_moves_through_definition() {
    let json = r##"{"inkVersion":17,"root":[["ev",{"VAR?":"c"},1,"+",{"VAR=":"c","re":true},{"VAR?":"c"},5,"+",{"VAR=":"d","re":true},"/ev","^done","\n","end",null],"done",{"global decl":["ev",{"list":{"Colours.red":1}},{"VAR=":"c"},{"list":{}},{"VAR=":"d"},"/ev","end",null]}],"listDefs":{"Colours":{"red":1,"green":2,"blue":3}}}"##;
    let mut story = story(json);
    assert_eq!(lines(&mut story), vec!["done\n"]);

    let Some(Value::List(c)) = story.variable("c") else {
        panic!("c should be a list");
    };
    assert_eq!(c.len(), 1);
    assert!(c.contains_item_named("green"));
    let Some(Value::List(d)) = story.variable("d") else {
        panic!("d should be a list");
    };
    assert!(d.is_empty());
}

#[test]
fn list_shift_beyond_int_range_empties_the_list() {
    let json = r##"{"inkVersion":17,"root":[["ev",{"VAR?":"c"},2147483647,"+",{"VAR=":"c","re":true},{"VAR?":"d"},-2147483648,"-",{"VAR=":"d","re":true},"/ev","^done","\n","end",null],"done",{"global decl":["ev",{"list":{"Colours.blue":3}},{"VAR=":"c"},{"list":{"Colours.red":1}},{"VAR=":"d"},"/ev","end",null]}],"listDefs":{"Colours":{"red":1,"green":2,"blue":3}}}"##;
    let mut story = story(json);
    assert_eq!(lines(&mut story), vec!["done\n"]);
    assert!(!story.has_error());

    for name in ["c", "d"] {
        let Some(Value::List(list)) = story.variable(name) else {
            panic!("{} should be a list", name);
        };
        assert!(list.is_empty());
    }
}

#[test]
fn missing_divert_variable_stops_the_story() {
    let json = r##"{"inkVersion":17,"root":[["^Line","\n",{"->":"target","var":true},null],"done",null]}"##;
    let mut story = story(json);
    assert_eq!(story.continue_story().expect("line"), "Line\n");
    assert!(story.has_error());
    assert!(!story.can_continue());
    assert_eq!(
        story.continue_story().expect_err("stopped").code,
        "STORY_CANNOT_CONTINUE"
    );

    story.reset_errors();
    assert!(!story.has_error());
}

#[test]
fn running_off_the_end_is_reported() {
    let json = r##"{"inkVersion":17,"root":[["^Hi","\n",null],null]}"##;
    let mut story = story(json);
    assert_eq!(story.continue_story().expect("line"), "Hi\n");
    assert_eq!(error_codes(&story), vec!["RUNTIME_END_OF_CONTENT"]);
    assert!(story.current_errors()[0].message.contains("ran out of content"));
}

#[test]
fn turns_since_counts_choices() {
    let json = CHOICES.replace("\"#f\":5", "\"#f\":7");
    let mut story = story(&json);
    lines(&mut story);
    story.choose_choice_index(0).expect("apple");
    assert_eq!(story.turns_since_for_path_string("0.c-0"), 0);
    assert_eq!(story.turns_since_for_path_string("0.c-1"), -1);
}
