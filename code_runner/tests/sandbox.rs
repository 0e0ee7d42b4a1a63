use code_runner::{Capability, ErrorKind, ExecutionLimits, Sandbox};
use serde_json::json;
use serial_test::serial;
use util::config::AppConfig;

fn no_input() -> Vec<String> {
    Vec::new()
}

#[test]
fn prompt_then_log_end_to_end() {
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script(
        "const n = prompt('n?'); console.log('got ' + n)",
        ["7"],
    );

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.error, None);
    assert_eq!(result.console_output, ["PROMPT: n?", "got 7"]);
    assert_eq!(result.all_output, ["PROMPT: n?", "got 7"]);
    assert_eq!(result.call_counts.prompt, 1);
    assert_eq!(result.call_counts.console_log, 1);
    assert_eq!(result.call_counts.alert, 0);
    assert_eq!(result.variables.declared.iter().collect::<Vec<_>>(), ["n"]);
    assert_eq!(result.variables.accessed.iter().collect::<Vec<_>>(), ["n"]);
    assert_eq!(result.binding("n"), Some(&json!("7")));
}

#[test]
fn declared_function_can_be_invoked_afterwards() {
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script("function add(a, b) { return a + b }", no_input());
    assert!(result.success);

    assert!(sandbox.has_function_with_signature("add", 2));
    assert!(!sandbox.has_function_with_signature("add", 3));

    let call = sandbox.run_function("add", &[json!(2), json!(3)]);
    assert!(call.success, "{:?}", call.error);
    assert_eq!(call.return_value, json!(5));
}

#[test]
fn identical_runs_are_deterministic() {
    let code = r#"
        const name = prompt('Name?');
        const roll = Math.floor(Math.random() * 100);
        console.log(`Hello ${name}, you rolled ${roll}`);
        alert('done');
    "#;
    let mut sandbox = Sandbox::default();
    let first = sandbox.run_script(code, ["Ann"]);
    let second = sandbox.run_script(code, ["Ann"]);

    assert!(first.success);
    assert_eq!(first.all_output, second.all_output);
    assert_eq!(first.call_counts, second.call_counts);
    assert_eq!(first.variables, second.variables);
}

#[test]
fn runs_do_not_leak_bindings_into_each_other() {
    let mut sandbox = Sandbox::default();
    let first = sandbox.run_script("let x = 1; console.log(x)", no_input());
    assert!(first.declared("x"));

    let second = sandbox.run_script("let y = typeof x; console.log(y)", no_input());
    assert!(second.success, "{:?}", second.error);
    assert!(!second.declared("x"));
    assert_eq!(second.console_output, ["undefined"]);
}

#[test]
fn prompt_responses_are_consumed_first_in_first_out() {
    let code = r#"
        const a = prompt('first');
        const b = prompt('second');
        const c = prompt('third', 'fallback');
        const d = prompt('fourth');
        console.log(a, b, c, d === '');
    "#;
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script(code, ["a", "b"]);

    assert!(result.success);
    assert_eq!(result.count(Capability::Prompt), 4);
    assert_eq!(result.console_output.last().map(String::as_str), Some("a b fallback true"));
}

#[test]
fn output_before_a_throw_is_kept() {
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script(
        "console.log('one'); console.log('two'); throw new Error('three'); console.log('four');",
        no_input(),
    );

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::RuntimeError));
    assert_eq!(result.error.as_deref(), Some("Error: three"));
    assert_eq!(result.console_output, ["one", "two"]);
}

#[test]
fn missing_function_is_distinct_from_a_throwing_one() {
    let mut sandbox = Sandbox::default();
    sandbox.run_script(
        "function explode() { throw new TypeError('bad input') }\nconst notAFunction = 3;",
        no_input(),
    );

    assert!(!sandbox.has_function_with_signature("doesNotExist", 1));

    let missing = sandbox.run_function("doesNotExist", &[]);
    assert!(!missing.success);
    assert_eq!(missing.error_kind, Some(ErrorKind::NotFoundError));
    assert!(missing.is_not_found());

    let not_callable = sandbox.run_function("notAFunction", &[]);
    assert_eq!(not_callable.error_kind, Some(ErrorKind::NotFoundError));

    let thrown = sandbox.run_function("explode", &[]);
    assert!(!thrown.success);
    assert_eq!(thrown.error_kind, Some(ErrorKind::RuntimeError));
    assert_eq!(thrown.error.as_deref(), Some("TypeError: bad input"));
}

#[test]
fn run_function_without_a_script_reports_not_found() {
    let mut sandbox = Sandbox::default();
    let call = sandbox.run_function("add", &[json!(1)]);
    assert!(call.is_not_found());
    assert_eq!(call.error.as_deref(), Some("Function 'add' not found"));
}

#[test]
fn interval_fires_exactly_until_cleared() {
    let code = r#"
        let ticks = 0;
        const id = setInterval(() => {
            ticks++;
            console.log('tick ' + ticks);
            if (ticks === 5) clearInterval(id);
        }, 1000);
    "#;
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script(code, no_input());

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.call_counts.set_interval, 1);
    assert_eq!(result.call_counts.clear_interval, 1);
    assert_eq!(result.call_counts.timer_fires(1), 5);
    assert_eq!(result.console_output.len(), 5);
    assert_eq!(result.binding("ticks"), Some(&json!(5)));

    let timer = sandbox.mock_state().timer(1).unwrap();
    assert!(!timer.is_active);
    assert_eq!(timer.invocation_count, 5);
}

#[test]
fn already_queued_fire_of_a_cleared_timer_is_skipped() {
    let code = r#"
        let a = 0, b = 0;
        const first = setInterval(() => {
            a++;
            if (a === 3) { clearInterval(first); clearInterval(second); }
        }, 10);
        const second = setInterval(() => { b++; }, 10);
    "#;
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script(code, no_input());

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.call_counts.timer_fires(1), 3);
    assert_eq!(result.call_counts.timer_fires(2), 2);
    assert_eq!(result.binding("b"), Some(&json!(2)));
}

#[test]
fn timeout_fires_once_and_receives_extra_arguments() {
    let code = "setTimeout((who) => console.log('hi ' + who), 5000, 'there'); console.log('first');";
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script(code, no_input());

    assert_eq!(result.console_output, ["first", "hi there"]);
    assert_eq!(result.call_counts.set_timeout, 1);
    assert_eq!(result.call_counts.timer_fires(1), 1);
}

#[test]
fn uncleared_interval_hits_the_ceiling() {
    let limits = ExecutionLimits::default().with_max_timer_invocations(50);
    let mut sandbox = Sandbox::new(limits);
    let result = sandbox.run_script("let n = 0; setInterval(() => { n++ }, 1)", no_input());

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::TimeoutError));
    assert!(result.error.as_ref().unwrap().contains("fired 50 times"));
    assert_eq!(result.call_counts.timer_fires(1), 50);
    assert_eq!(result.binding("n"), Some(&json!(50)));
}

#[test]
fn infinite_loop_times_out() {
    let mut sandbox = Sandbox::new(ExecutionLimits::default().with_timeout_ms(50));
    let result = sandbox.run_script("console.log('start'); while (true) {}", no_input());

    assert!(!result.success);
    assert!(result.timed_out());
    assert_eq!(result.error.as_deref(), Some("Execution timed out after 50ms"));
    assert_eq!(result.console_output, ["start"]);
}

#[test]
fn timeouts_cannot_be_caught() {
    let mut sandbox = Sandbox::new(ExecutionLimits::default().with_timeout_ms(30));
    let result = sandbox.run_script(
        "try { for (;;) {} } catch (e) { console.log('caught') } finally { console.log('finally') }",
        no_input(),
    );
    assert!(result.timed_out());
    assert!(result.console_output.is_empty());
}

#[test]
fn invoked_function_is_also_time_bounded() {
    let mut sandbox = Sandbox::new(ExecutionLimits::default().with_timeout_ms(50));
    sandbox.run_script("function spin() { while (true) {} }", no_input());
    let call = sandbox.run_function("spin", &[]);
    assert_eq!(call.error_kind, Some(ErrorKind::TimeoutError));
}

#[test]
fn syntax_errors_are_compile_failures() {
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script("console.log('never');\nlet = ;", no_input());

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::CompileError));
    assert!(result.error.unwrap().starts_with("SyntaxError:"));
    assert!(result.all_output.is_empty());
    assert!(result.variables.declared.is_empty());
}

#[test]
fn escape_hatches_are_undefined() {
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script(
        "console.log(typeof require, typeof fetch, typeof process, typeof globalThis, typeof eval)",
        no_input(),
    );
    assert_eq!(result.console_output, ["undefined undefined undefined undefined undefined"]);
    assert!(result.variables.accessed.is_empty());

    let result = sandbox.run_script("require('fs')", no_input());
    assert_eq!(result.error_kind, Some(ErrorKind::RuntimeError));
}

#[test]
fn placeholders_absorb_module_boilerplate() {
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script(
        "function area(r) { return Math.PI * r * r }\nmodule.exports = { area };\nif (typeof window !== 'undefined') console.log('browser');",
        no_input(),
    );
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.console_output, ["browser"]);
}

#[test]
fn alerts_and_tables_are_tagged() {
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script(
        "alert('Hi'); console.table([{ item: 'tea', qty: 2 }]); console.log('after');",
        no_input(),
    );

    assert_eq!(result.alert_output, ["Hi"]);
    assert_eq!(
        result.console_output,
        ["ALERT: Hi", r#"TABLE: [{"item":"tea","qty":2}]"#, "after"]
    );
    assert_eq!(
        result.all_output,
        ["Hi", r#"TABLE: [{"item":"tea","qty":2}]"#, "after"]
    );
    assert_eq!(result.count(Capability::ConsoleTable), 1);
    assert_eq!(result.count(Capability::Alert), 1);
}

#[test]
fn invocations_share_the_session_but_not_the_output() {
    let code = r#"
        let balance = 100;
        function withdraw(amount) {
            balance -= amount;
            console.log('left ' + balance);
            return balance;
        }
    "#;
    let mut sandbox = Sandbox::default();
    sandbox.run_script(code, no_input());

    let first = sandbox.run_function("withdraw", &[json!(30)]);
    assert_eq!(first.return_value, json!(70));
    assert_eq!(first.console_output, ["left 70"]);

    let second = sandbox.run_function("withdraw", &[json!(20)]);
    assert_eq!(second.return_value, json!(50));
    assert_eq!(second.console_output, ["left 50"]);
}

#[test]
fn context_snapshot_exposes_final_values() {
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script(
        "const scores = [4, 8, 15];\nconst total = scores.reduce((sum, s) => sum + s, 0);\nvar label = 'sum';",
        no_input(),
    );

    assert_eq!(result.binding("scores"), Some(&json!([4, 8, 15])));
    assert_eq!(result.binding("total"), Some(&json!(27)));
    assert_eq!(result.binding("label"), Some(&json!("sum")));
    let keys: Vec<&String> = result.context.keys().collect();
    assert_eq!(keys, ["scores", "total", "label"]);
}

#[test]
fn language_features_behave_like_javascript() {
    let code = r#"
        const names = ['bob', 'alice', 'carol'];
        const sorted = [...names].sort();
        console.log(sorted.join(', '));
        console.log(`Total: ${(19.999).toFixed(2)}`);
        const person = { name: 'Ann', age: 30 };
        console.log(JSON.stringify(person));
        function makeCounter() { let c = 0; return () => ++c; }
        const next = makeCounter();
        next(); next();
        console.log('count=' + next());
        console.log([3, 1, 10, 2].sort((a, b) => a - b));
        console.log('a-b-c'.split('-').map(s => s.toUpperCase()).join(''));
        try { null.x; } catch (e) { console.log(e.name); }
        let out = '';
        for (let i = 0; i < 3; i++) { out += i; }
        console.log(out);
        switch (2) {
            case 1: console.log('one');
            case 2: console.log('two');
            case 3: console.log('three'); break;
            default: console.log('other');
        }
        console.log(0.1 + 0.2, 1 / 0, typeof undefinedThing);
    "#;
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script(code, no_input());

    assert!(result.success, "{:?}", result.error);
    assert_eq!(
        result.console_output,
        [
            "alice, bob, carol",
            "Total: 20.00",
            r#"{"name":"Ann","age":30}"#,
            "count=3",
            "1,2,3,10",
            "ABC",
            "TypeError",
            "012",
            "two",
            "three",
            "0.30000000000000004 Infinity undefined",
        ]
    );
}

#[test]
fn closures_capture_per_iteration_bindings() {
    let code = r#"
        const fns = [];
        for (let i = 0; i < 3; i++) { fns.push(() => i); }
        console.log(fns.map(f => f()).join(' '));
        var total = 0;
        for (const n of [1, 2, 3]) { total += n; }
        for (const key in { a: 1, b: 2 }) { console.log(key); }
        console.log(total);
    "#;
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script(code, no_input());
    assert_eq!(result.console_output, ["0 1 2", "a", "b", "6"]);
}

#[test]
fn const_reassignment_is_a_type_error() {
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script("const rate = 0.15;\nrate = 0.2;", no_input());
    assert_eq!(result.error_kind, Some(ErrorKind::RuntimeError));
    assert!(result.error.unwrap().starts_with("TypeError"));
}

#[test]
fn runaway_recursion_is_a_range_error() {
    let mut sandbox = Sandbox::new(ExecutionLimits::default().with_max_call_depth(50));
    let result = sandbox.run_script("function f(n) { return f(n + 1) }\nf(0);", no_input());
    assert_eq!(result.error.as_deref(), Some("RangeError: Maximum call stack size exceeded"));
}

#[test]
fn huge_allocations_are_refused() {
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script("const s = 'x'.repeat(1e12);", no_input());
    assert_eq!(result.error_kind, Some(ErrorKind::RuntimeError));
    assert!(result.error.unwrap().starts_with("RangeError"));
}

#[test]
fn uncaught_primitives_are_reported() {
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script("throw 'insufficient funds';", no_input());
    assert_eq!(result.error.as_deref(), Some("Uncaught insufficient funds"));
}

#[test]
fn deeply_nested_expressions_evaluate() {
    let code = format!("const x = {}1{};", "(".repeat(200), ")".repeat(200));
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script(&code, no_input());

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.binding("x"), Some(&json!(1)));
}

#[test]
fn long_linked_lists_are_snapshotted() {
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script(
        "let head = null;\nfor (let i = 0; i < 5000; i++) { head = { v: i, next: head }; }",
        no_input(),
    );

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.binding("head").map(|h| &h["v"]), Some(&json!(4999)));
}

#[test]
fn ordinary_recursion_is_not_cut_short() {
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script(
        "function sum(n) { return n <= 0 ? 0 : n + sum(n - 1) }\nconsole.log(sum(200));",
        no_input(),
    );
    assert_eq!(result.console_output, ["20100"]);

    let call = sandbox.run_function("sum", &[json!(2000)]);
    assert!(call.success, "{:?}", call.error);
    assert_eq!(call.return_value, json!(2001000));
}

#[test]
fn modern_syntax_runs() {
    let code = r#"
        class Account {
            #balance = 0;
            constructor(owner) { this.owner = owner; }
            get balance() { return this.#balance; }
            set balance(v) { this.#balance = Math.max(0, v); }
            static open(owner) { return new Account(owner); }
        }
        const acc = Account.open('Ann');
        acc.balance = 25;
        acc.balance = -5;
        console.log(acc.owner, acc.balance);

        const { a, b: [first, ...rest], ...others } = { a: 1, b: [2, 3, 4], c: 5, d: 6 };
        console.log(a, first, rest.join('+'), Object.keys(others).join(''));

        outer: for (let i = 0; i < 3; i++) {
            for (let j = 0; j < 3; j++) {
                if (j === 1) continue outer;
                if (i === 2) break outer;
                console.log(`i${i}j${j}`);
            }
        }

        async function total(values) {
            let sum = 0;
            for (const v of values) sum += await Promise.resolve(v);
            return sum;
        }
        total([1, 2, 3]).then((sum) => console.log('async ' + sum));
    "#;
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script(code, no_input());

    assert!(result.success, "{:?}", result.error);
    assert_eq!(
        result.console_output,
        ["Ann 0", "1 2 3+4 cd", "i0j0", "i1j0", "async 6"]
    );
    assert!(result.declared("Account"));
    assert!(result.accessed("total"));
}

#[test]
fn default_sort_compares_utf16_code_units() {
    let mut sandbox = Sandbox::default();
    let result = sandbox.run_script(
        r#"const sorted = ["\uFF61", "\u{1F600}"].sort();
console.log(sorted.map((s) => s.codePointAt(0).toString(16)).join(' '));"#,
        no_input(),
    );
    assert_eq!(result.console_output, ["1f600 ff61"]);
}

#[test]
#[serial]
fn sandbox_limits_follow_app_config() {
    AppConfig::set_sandbox_timeout_ms(40);
    AppConfig::set_max_timer_invocations(7);
    let sandbox = Sandbox::from_config(&AppConfig::global());
    assert_eq!(sandbox.limits().timeout_ms, 40);
    assert_eq!(sandbox.limits().max_timer_invocations, 7);
    AppConfig::reset();
}
